//! The batched writer.
//!
//! Buffers order, transaction and position rows into fixed-size chunks and
//! appends each full chunk to the store in one multi-row call. Store
//! failures are logged and dropped: the engine treats the store as
//! at-most-once best-effort and never lets it touch matcher state.

use crate::store::client::StoreClient;
use crate::store::rows::{OrderRow, PositionRow, PriceRow, SymbolRow};
use tracing::error;

/// Default chunk size for the batched tables.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Chunking writer over a [`StoreClient`].
#[derive(Debug)]
pub struct BatchWriter<S: StoreClient> {
    store: S,
    chunk_size: usize,
    orders: Vec<OrderRow>,
    transactions: Vec<OrderRow>,
    positions: Vec<PositionRow>,
    /// Writes that the store refused; kept for observability.
    failed_writes: u64,
}

impl<S: StoreClient> BatchWriter<S> {
    /// Creates a writer with the default chunk size.
    pub fn new(store: S) -> Self {
        Self::with_chunk_size(store, DEFAULT_CHUNK_SIZE)
    }

    /// Creates a writer flushing every `chunk_size` rows per table. A size
    /// of 0 is treated as 1 (flush on every row).
    pub fn with_chunk_size(store: S, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            orders: Vec::new(),
            transactions: Vec::new(),
            positions: Vec::new(),
            failed_writes: 0,
        }
    }

    /// Number of store writes that failed so far.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }

    /// Writes a symbols row immediately (symbols are rare).
    pub fn insert_symbol(&mut self, row: SymbolRow) {
        if let Err(err) = self.store.insert_symbol(row) {
            self.failed_writes += 1;
            error!("symbols insert failed: {err}");
        }
    }

    /// Writes a prices row immediately.
    pub fn insert_price(&mut self, row: PriceRow) {
        if let Err(err) = self.store.insert_price(row) {
            self.failed_writes += 1;
            error!("prices insert failed: {err}");
        }
    }

    /// Buffers an orders row, flushing the chunk when full.
    pub fn push_order(&mut self, row: OrderRow) {
        self.orders.push(row);
        if self.orders.len() >= self.chunk_size {
            self.flush_orders();
        }
    }

    /// Buffers a transactions row, flushing the chunk when full.
    pub fn push_transaction(&mut self, row: OrderRow) {
        self.transactions.push(row);
        if self.transactions.len() >= self.chunk_size {
            self.flush_transactions();
        }
    }

    /// Buffers a positions row, flushing the chunk when full.
    pub fn push_position(&mut self, row: PositionRow) {
        self.positions.push(row);
        if self.positions.len() >= self.chunk_size {
            self.flush_positions();
        }
    }

    /// Drains every non-empty chunk, e.g. at shutdown.
    pub fn flush(&mut self) {
        self.flush_orders();
        self.flush_transactions();
        self.flush_positions();
    }

    /// Consumes the writer, draining all chunks and returning the client.
    pub fn into_store(mut self) -> S {
        self.flush();
        self.store
    }

    fn flush_orders(&mut self) {
        if self.orders.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.orders);
        if let Err(err) = self.store.insert_orders(chunk) {
            self.failed_writes += 1;
            error!("orders chunk insert failed: {err}");
        }
    }

    fn flush_transactions(&mut self) {
        if self.transactions.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.transactions);
        if let Err(err) = self.store.insert_transactions(chunk) {
            self.failed_writes += 1;
            error!("transactions chunk insert failed: {err}");
        }
    }

    fn flush_positions(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.positions);
        if let Err(err) = self.store.upsert_positions(chunk) {
            self.failed_writes += 1;
            error!("positions chunk upsert failed: {err}");
        }
    }
}
