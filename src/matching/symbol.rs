//! Symbol descriptors and the symbol registry.

use crate::matching::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Symbol identifier.
pub type SymbolId = u32;

/// Contract class of a symbol.
///
/// Discriminants are part of the external contract: everything at or above
/// [`SymbolKind::InversePerp`] (10) is an inverse contract, where PnL is
/// denominated in the base asset and proportional to `1/entry - 1/exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SymbolKind {
    /// Plain spot market.
    Spot = 0,
    /// Linear perpetual swap.
    VanillaPerp = 1,
    /// Linear dated future.
    VanillaFut = 2,
    /// Option on a linear perpetual.
    OptionVanillaPerp = 3,
    /// Option on a linear future.
    OptionVanillaFut = 4,
    /// Inverse perpetual swap.
    InversePerp = 10,
    /// Inverse dated future.
    InverseFut = 11,
    /// Option on an inverse perpetual.
    OptionInversePerp = 12,
    /// Option on an inverse future.
    OptionInverseFut = 13,
}

impl SymbolKind {
    /// True for contracts with inverse (base-denominated) PnL.
    pub fn is_inverse(self) -> bool {
        self as u32 >= SymbolKind::InversePerp as u32
    }
}

/// Immutable symbol descriptor.
///
/// Created by the admin `add_symbol` operation and never mutated afterwards.
/// The short name is stored NUL-padded in a fixed 8-byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol id, unique across the engine.
    pub id: SymbolId,
    /// Short textual name, at most 8 bytes; longer names are truncated.
    name: [u8; 8],
    /// Contract class.
    pub kind: SymbolKind,
    /// Contract multiplier.
    pub multiplier: u64,
    /// Quantity divisor used by the risk engine; always >= 1.
    pub quantity_divisor: u64,
}

impl Symbol {
    /// Creates a new symbol descriptor. A zero `multiplier` or
    /// `quantity_divisor` is normalized to 1.
    pub fn new(
        id: SymbolId,
        name: &str,
        kind: SymbolKind,
        multiplier: u64,
        quantity_divisor: u64,
    ) -> Self {
        let mut buf = [0u8; 8];
        let bytes = name.as_bytes();
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            id,
            name: buf,
            kind,
            multiplier: multiplier.max(1),
            quantity_divisor: quantity_divisor.max(1),
        }
    }

    /// The symbol name as a string slice (NUL padding stripped).
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// True when this symbol is an inverse contract.
    pub fn is_inverse(&self) -> bool {
        self.kind.is_inverse()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol(id={}; name={})", self.id, self.name())
    }
}

/// Registry of symbol descriptors keyed by id.
///
/// Owned by the market manager; lookups are O(1).
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    symbols: HashMap<SymbolId, Symbol>,
}

impl SymbolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a symbol. Fails with [`ErrorCode::SymbolDuplicate`] when the
    /// id is already taken.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), ErrorCode> {
        if self.symbols.contains_key(&symbol.id) {
            return Err(ErrorCode::SymbolDuplicate);
        }
        self.symbols.insert(symbol.id, symbol);
        Ok(())
    }

    /// Removes a symbol, returning the descriptor. Fails with
    /// [`ErrorCode::SymbolNotFound`] when absent.
    pub fn remove(&mut self, id: SymbolId) -> Result<Symbol, ErrorCode> {
        self.symbols.remove(&id).ok_or(ErrorCode::SymbolNotFound)
    }

    /// Looks up a symbol by id.
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// True when a symbol with this id is registered.
    pub fn contains(&self, id: SymbolId) -> bool {
        self.symbols.contains_key(&id)
    }

    /// Number of registered symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when no symbols are registered.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over all registered symbols in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}
