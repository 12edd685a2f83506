//! The store client seam.
//!
//! The engine treats the external store as an at-most-once, best-effort
//! consumer of the event stream: rows move out through [`StoreClient`] and
//! failures never roll back matcher state. The client is always an explicit
//! collaborator handed to its owner at construction.

use crate::store::rows::{OrderRow, PositionRow, PriceRow, SymbolRow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Store-side failure; surfaced only through the writer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The connection to the store is gone.
    #[error("store connection lost")]
    Disconnected,

    /// The store rejected a write.
    #[error("store rejected write: {message}")]
    Rejected {
        /// Store-side reason.
        message: String,
    },

    /// The background store worker is no longer running.
    #[error("store worker unavailable")]
    WorkerUnavailable,
}

/// Multi-row append interface to the external tabular store.
///
/// Orders and transactions use insert semantics; positions upsert by id.
/// Symbols and prices are low-volume streams written row by row.
pub trait StoreClient: Send {
    /// Appends one symbols row.
    fn insert_symbol(&mut self, row: SymbolRow) -> Result<(), StoreError>;

    /// Appends one prices row.
    fn insert_price(&mut self, row: PriceRow) -> Result<(), StoreError>;

    /// Appends a chunk of orders rows.
    fn insert_orders(&mut self, rows: Vec<OrderRow>) -> Result<(), StoreError>;

    /// Appends a chunk of transactions rows.
    fn insert_transactions(&mut self, rows: Vec<OrderRow>) -> Result<(), StoreError>;

    /// Upserts a chunk of positions rows, keyed by position id.
    fn upsert_positions(&mut self, rows: Vec<PositionRow>) -> Result<(), StoreError>;
}

/// In-memory tables, shared behind the handle.
#[derive(Debug, Default)]
pub struct MemoryTables {
    /// `symbols` rows in arrival order.
    pub symbols: Vec<SymbolRow>,
    /// `prices` rows in arrival order.
    pub prices: Vec<PriceRow>,
    /// `orders` rows in arrival order.
    pub orders: Vec<OrderRow>,
    /// `transactions` rows in arrival order.
    pub transactions: Vec<OrderRow>,
    /// `positions` rows, latest state per position id.
    pub positions: HashMap<u64, PositionRow>,
}

/// An in-process [`StoreClient`] backed by shared vectors, used by the
/// tests and as a development stand-in. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the tables, for inspection after a flush.
    pub fn tables(&self) -> Arc<Mutex<MemoryTables>> {
        Arc::clone(&self.tables)
    }
}

impl StoreClient for MemoryStore {
    fn insert_symbol(&mut self, row: SymbolRow) -> Result<(), StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Disconnected)?
            .symbols
            .push(row);
        Ok(())
    }

    fn insert_price(&mut self, row: PriceRow) -> Result<(), StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Disconnected)?
            .prices
            .push(row);
        Ok(())
    }

    fn insert_orders(&mut self, mut rows: Vec<OrderRow>) -> Result<(), StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Disconnected)?
            .orders
            .append(&mut rows);
        Ok(())
    }

    fn insert_transactions(&mut self, mut rows: Vec<OrderRow>) -> Result<(), StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Disconnected)?
            .transactions
            .append(&mut rows);
        Ok(())
    }

    fn upsert_positions(&mut self, rows: Vec<PositionRow>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Disconnected)?;
        for row in rows {
            tables.positions.insert(row.id, row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::order::Order;
    use crate::risk::position::Position;

    #[test]
    fn test_memory_store_clones_share_tables() {
        let store = MemoryStore::new();
        let mut clone = store.clone();
        let order = Order::buy_limit(1, 1, 100, 10);
        clone
            .insert_orders(vec![OrderRow::from_order(&order, 1)])
            .unwrap();

        assert_eq!(store.tables().lock().unwrap().orders.len(), 1);
    }

    #[test]
    fn test_positions_upsert_by_id() {
        let mut store = MemoryStore::new();
        let mut position = Position::flat(1, 1, 1);
        store
            .upsert_positions(vec![PositionRow::from_position(&position, 1)])
            .unwrap();
        position.quantity = 5;
        store
            .upsert_positions(vec![PositionRow::from_position(&position, 2)])
            .unwrap();

        let tables = store.tables();
        let tables = tables.lock().unwrap();
        assert_eq!(tables.positions.len(), 1);
        assert_eq!(tables.positions[&1].quantity, 5);
    }
}
