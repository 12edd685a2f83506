//! Row types for the external tabular store.
//!
//! One struct per table. Rows are plain serializable values, built from the
//! engine's records at event time; the store client decides how they land.

use crate::matching::order::{
    AccountId, Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, TimeInForce,
};
use crate::matching::symbol::{Symbol, SymbolId, SymbolKind};
use crate::risk::position::{Position, PositionSide};
use serde::{Deserialize, Serialize};

/// A `symbols` table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRow {
    pub id: SymbolId,
    pub time: u64,
    pub name: String,
    pub kind: SymbolKind,
    pub multiplier: u64,
}

impl SymbolRow {
    /// Builds the row for a symbol at `time` (ms).
    pub fn from_symbol(symbol: &Symbol, time: u64) -> Self {
        Self {
            id: symbol.id,
            time,
            name: symbol.name().to_string(),
            kind: symbol.kind,
            multiplier: symbol.multiplier,
        }
    }
}

/// A `prices` table row: one mark-price tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub time: u64,
    pub symbol_id: SymbolId,
    pub mark_price: Price,
    pub index_price: Price,
    pub best_bid: Price,
    pub best_ask: Price,
    pub risk_z: f64,
    pub risk_c: f64,
}

/// An `orders` or `transactions` table row (the two tables share columns;
/// a transaction row additionally carries the execution price and size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub symbol_id: SymbolId,
    pub executed_quantity: Quantity,
    pub leaves_quantity: Quantity,
    pub max_visible_quantity: Quantity,
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub slippage: Price,
    pub stop_price: Price,
    pub time_in_force: TimeInForce,
    pub trailing_distance: i64,
    pub trailing_step: i64,
    pub kind: OrderKind,
    pub time: u64,
    pub account_id: AccountId,
    pub exec_price: Price,
    pub exec_quantity: Quantity,
    pub status: OrderStatus,
}

impl OrderRow {
    /// Builds a lifecycle row (no execution columns).
    pub fn from_order(order: &Order, time: u64) -> Self {
        Self::from_execution(order, 0, 0, time)
    }

    /// Builds a transaction row carrying one execution.
    pub fn from_execution(
        order: &Order,
        exec_price: Price,
        exec_quantity: Quantity,
        time: u64,
    ) -> Self {
        Self {
            id: order.id,
            symbol_id: order.symbol_id,
            executed_quantity: order.executed_quantity,
            leaves_quantity: order.leaves_quantity,
            max_visible_quantity: order.max_visible_quantity,
            price: order.price,
            quantity: order.quantity,
            side: order.side,
            slippage: order.slippage,
            stop_price: order.stop_price,
            time_in_force: order.time_in_force,
            trailing_distance: order.trailing_distance,
            trailing_step: order.trailing_step,
            kind: order.kind,
            time,
            account_id: order.account_id,
            exec_price,
            exec_quantity,
            status: order.status,
        }
    }
}

/// A `positions` table row, upserted by position id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    pub id: u64,
    pub symbol_id: SymbolId,
    pub avg_entry_price: f64,
    pub quantity: Quantity,
    pub side: PositionSide,
    pub time: u64,
    pub account_id: AccountId,
    pub risk_z: f64,
    pub risk_c: f64,
    pub funding: f64,
    pub mark_price: Price,
    pub index_price: Price,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

impl PositionRow {
    /// Builds the row for a position at `time` (ms).
    pub fn from_position(position: &Position, time: u64) -> Self {
        Self {
            id: position.id,
            symbol_id: position.symbol_id,
            avg_entry_price: position.avg_entry_price,
            quantity: position.quantity,
            side: position.side,
            time,
            account_id: position.account_id,
            risk_z: position.risk_z,
            risk_c: position.risk_c,
            funding: position.funding,
            mark_price: position.mark_price,
            index_price: position.index_price,
            realized_pnl: position.realized_pnl,
            unrealized_pnl: position.unrealized_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_row_carries_execution_columns() {
        let mut order = Order::buy_limit(1, 2, 100, 10).with_account(9);
        order.fill(4);
        let row = OrderRow::from_execution(&order, 100, 4, 123);

        assert_eq!(row.id, 1);
        assert_eq!(row.symbol_id, 2);
        assert_eq!(row.executed_quantity, 4);
        assert_eq!(row.leaves_quantity, 6);
        assert_eq!(row.exec_price, 100);
        assert_eq!(row.exec_quantity, 4);
        assert_eq!(row.account_id, 9);
        assert_eq!(row.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_symbol_row_name() {
        let symbol = Symbol::new(3, "ETHUSD", SymbolKind::InversePerp, 10, 100);
        let row = SymbolRow::from_symbol(&symbol, 5);
        assert_eq!(row.name, "ETHUSD");
        assert_eq!(row.kind, SymbolKind::InversePerp);
        assert_eq!(row.multiplier, 10);
    }
}
