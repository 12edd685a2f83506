//! Per-account position records and the PnL numerics.
//!
//! Everything in this module is floating point (`f64`) and deliberately off
//! the consensus-critical path: the matcher never reads these values back.
//! Division-by-zero edges are handled by sentinel substitution (an average
//! entry price of 1) and clamping non-finite intermediates.

use crate::matching::order::{Price, Quantity, Side};
use crate::matching::symbol::{Symbol, SymbolId};
use crate::matching::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    /// Net bought. A flat position defaults to long.
    Long,
    /// Net sold.
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// A per-(account, symbol) position with incremental PnL and funding state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Engine-assigned position id, monotonically increasing.
    pub id: u64,
    /// Symbol the position is in.
    pub symbol_id: SymbolId,
    /// Owning account.
    pub account_id: AccountId,
    /// Direction; long when flat.
    pub side: PositionSide,
    /// Unsigned position size.
    pub quantity: Quantity,
    /// Average entry price (fractional).
    pub avg_entry_price: f64,
    /// Latest mark price seen for the symbol.
    pub mark_price: Price,
    /// Latest exogenous index price seen for the symbol.
    pub index_price: Price,
    /// Funding coefficient Z (see the risk engine).
    pub risk_z: f64,
    /// Funding coefficient C.
    pub risk_c: f64,
    /// Accumulated funding.
    pub funding: f64,
    /// Realized PnL over the session.
    pub realized_pnl: f64,
    /// Unrealized PnL as of the last execution.
    pub unrealized_pnl: f64,
    /// Timestamp (ms) of the last funding accrual; 0 before the first tick.
    pub last_funding_time: u64,
}

impl Position {
    /// Creates a flat position.
    pub fn flat(id: u64, symbol_id: SymbolId, account_id: AccountId) -> Self {
        Self {
            id,
            symbol_id,
            account_id,
            side: PositionSide::Long,
            quantity: 0,
            avg_entry_price: 0.0,
            mark_price: 0,
            index_price: 0,
            risk_z: 0.0,
            risk_c: 0.0,
            funding: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            last_funding_time: 0,
        }
    }

    /// The position size with its sign: positive long, negative short.
    pub fn signed_quantity(&self) -> i64 {
        match self.side {
            PositionSide::Long => self.quantity as i64,
            PositionSide::Short => -(self.quantity as i64),
        }
    }

    /// True when the position holds no quantity.
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Folds one execution into the position: updates size, side, average
    /// entry price, unrealized PnL and the realized PnL accumulator, using
    /// linear or inverse numerics per the symbol's contract class.
    pub fn apply_execution(
        &mut self,
        symbol: &Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) {
        if quantity == 0 || price == 0 {
            return;
        }
        let q_signed: i64 = match side {
            Side::Buy => quantity as i64,
            Side::Sell => -(quantity as i64),
        };
        let q = q_signed as f64;
        let q_pos = self.signed_quantity() as f64;
        let total = q_pos + q;
        let div = symbol.quantity_divisor as f64;
        let mult = symbol.multiplier as f64;
        let p = price as f64;
        let old_avg = if self.avg_entry_price == 0.0 {
            1.0
        } else {
            self.avg_entry_price
        };

        let (mut realized_delta, mut unrealized, mut new_avg) = if symbol.is_inverse() {
            let denom = q_pos / old_avg + q / p;
            let avg = if denom != 0.0 { total / denom } else { 1.0 };
            let unrealized = total / div * (mult / avg - mult / p);
            let kernel = mult / old_avg - mult / p;
            let realized = if total * q_pos < 0.0 {
                // The position flipped: the whole previous size closed.
                q_pos / div * kernel
            } else if q_pos * q < 0.0 {
                // Partial close: the closed size carries the position's sign.
                -q / div * kernel
            } else {
                0.0
            };
            (realized, unrealized, avg)
        } else {
            let avg = if total != 0.0 {
                (q_pos * self.avg_entry_price + q * p) / total
            } else {
                1.0
            };
            let unrealized = total / div * (p - avg) / mult;
            let realized = if total * q_pos < 0.0 {
                q_pos * (p - old_avg) / (div * mult)
            } else if q_pos * q < 0.0 {
                -q * (p - old_avg) / (div * mult)
            } else {
                0.0
            };
            (realized, unrealized, avg)
        };

        if !new_avg.is_finite() || new_avg == 0.0 {
            new_avg = 1.0;
        }
        if !realized_delta.is_finite() {
            realized_delta = 0.0;
        }
        if !unrealized.is_finite() {
            unrealized = 0.0;
        }

        let total_signed = self.signed_quantity() + q_signed;
        self.quantity = total_signed.unsigned_abs();
        self.side = if total_signed >= 0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        self.avg_entry_price = new_avg;
        self.realized_pnl += realized_delta;
        self.unrealized_pnl = unrealized;
    }

    /// Accrues incremental funding and stores the latest mark/index state.
    ///
    /// The accumulator only moves when a previous funding timestamp exists
    /// and Z is nonzero (Z = 0 means the mark sits on the index).
    pub(crate) fn apply_funding_tick(
        &mut self,
        divisor: u64,
        risk_z: f64,
        risk_c: f64,
        mark_price: Price,
        index_price: Price,
        now_ms: u64,
    ) {
        if self.last_funding_time > 0 && risk_z > 0.0 {
            let elapsed_ms = now_ms.saturating_sub(self.last_funding_time) as f64;
            let delta = self.signed_quantity() as f64 / divisor as f64 * (risk_c / risk_z)
                * elapsed_ms
                / 60_000.0;
            if delta.is_finite() {
                self.funding += delta;
            }
        }
        self.risk_z = risk_z;
        self.risk_c = risk_c;
        self.mark_price = mark_price;
        self.index_price = index_price;
        self.last_funding_time = now_ms;
    }
}
