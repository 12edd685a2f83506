//! Store pipeline: row types, the store client seam, the batched writer and
//! the background flush worker.

pub mod client;
pub mod rows;
pub mod worker;
pub mod writer;

pub use client::{MemoryStore, MemoryTables, StoreClient, StoreError};
pub use rows::{OrderRow, PositionRow, PriceRow, SymbolRow};
pub use worker::StoreWorker;
pub use writer::{BatchWriter, DEFAULT_CHUNK_SIZE};
