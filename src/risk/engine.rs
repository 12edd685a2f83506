//! The risk engine: positions, mark price and funding accounting.
//!
//! Fed from the execution stream, one position per (account, symbol). The
//! engine never fails the matching path; numerical edge cases degrade to
//! clamped results instead of errors.

use crate::matching::order::{AccountId, Order, Price, Quantity};
use crate::matching::symbol::{Symbol, SymbolId};
use crate::risk::position::Position;
use std::collections::HashMap;
use tracing::trace;

/// Mid of the best bid and ask, rounded half away from zero. `None` when
/// either side is missing.
pub fn mark_price(best_bid: Option<Price>, best_ask: Option<Price>) -> Option<Price> {
    match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => Some(((bid as f64 + ask as f64) / 2.0).round() as Price),
        _ => None,
    }
}

/// Per-account position book with incremental PnL and funding.
#[derive(Debug, Default)]
pub struct RiskEngine {
    positions: HashMap<(AccountId, SymbolId), Position>,
    next_position_id: u64,
}

impl RiskEngine {
    /// Creates an engine with position ids seeded from 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with position ids seeded from an external value
    /// (typically the store's positions row count at startup).
    pub fn with_next_position_id(next_position_id: u64) -> Self {
        Self {
            positions: HashMap::new(),
            next_position_id,
        }
    }

    /// Looks up a position.
    pub fn position(&self, account_id: AccountId, symbol_id: SymbolId) -> Option<&Position> {
        self.positions.get(&(account_id, symbol_id))
    }

    /// Iterates over all positions in unspecified order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Pre-creates flat positions for an account across the given symbols,
    /// returning copies of the records created (or already present).
    pub fn open_account<'a>(
        &mut self,
        account_id: AccountId,
        symbols: impl IntoIterator<Item = &'a Symbol>,
    ) -> Vec<Position> {
        symbols
            .into_iter()
            .map(|symbol| *self.position_entry(account_id, symbol.id))
            .collect()
    }

    /// Folds one execution into the owning account's position and returns
    /// the updated record.
    pub fn order_executed(
        &mut self,
        symbol: &Symbol,
        order: &Order,
        price: Price,
        quantity: Quantity,
    ) -> &Position {
        let position = self.position_entry(order.account_id, order.symbol_id);
        position.apply_execution(symbol, order.side, price, quantity);
        trace!(
            "position {} account {} symbol {}: {} {} @ ~{:.4}",
            position.id,
            position.account_id,
            position.symbol_id,
            position.side,
            position.quantity,
            position.avg_entry_price
        );
        position
    }

    /// Funding rate from mark and index: `ln(mark/index)` for linear
    /// contracts, `ln(index/mark)` for inverse ones. Degenerate inputs give
    /// a zero rate.
    pub fn funding_rate(symbol: &Symbol, mark: Price, index: Price) -> f64 {
        if mark == 0 || index == 0 {
            return 0.0;
        }
        let rate = if symbol.is_inverse() {
            (index as f64 / mark as f64).ln()
        } else {
            (mark as f64 / index as f64).ln()
        };
        if rate.is_finite() { rate } else { 0.0 }
    }

    /// Risk coefficients (Z, C) carrying the contract-class dependence of
    /// the funding accumulator.
    pub fn risk_coefficients(symbol: &Symbol, mark: Price, index: Price) -> (f64, f64) {
        let rate = Self::funding_rate(symbol, mark, index);
        let mult = symbol.multiplier as f64;
        if symbol.is_inverse() {
            if index == 0 {
                return (0.0, 0.0);
            }
            let index = index as f64;
            (
                rate.abs() * mult / index,
                rate * rate * mult * mult / (index * index),
            )
        } else {
            let mark = mark as f64;
            (
                rate.abs() * mark / mult,
                rate * rate * mark * mark / (mult * mult),
            )
        }
    }

    /// Applies a mark-price tick for `symbol` to every account holding it:
    /// accrues incremental funding and stores mark, index, Z and C on each
    /// position record. Returns the coefficients for the prices stream.
    pub fn mark_price_tick(
        &mut self,
        symbol: &Symbol,
        mark: Price,
        index: Price,
        now_ms: u64,
    ) -> (f64, f64) {
        let (risk_z, risk_c) = Self::risk_coefficients(symbol, mark, index);
        for position in self
            .positions
            .values_mut()
            .filter(|p| p.symbol_id == symbol.id)
        {
            position.apply_funding_tick(
                symbol.quantity_divisor,
                risk_z,
                risk_c,
                mark,
                index,
                now_ms,
            );
        }
        (risk_z, risk_c)
    }

    fn position_entry(&mut self, account_id: AccountId, symbol_id: SymbolId) -> &mut Position {
        match self.positions.entry((account_id, symbol_id)) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let id = self.next_position_id;
                self.next_position_id += 1;
                entry.insert(Position::flat(id, symbol_id, account_id))
            }
        }
    }
}
