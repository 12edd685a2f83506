//! Curated re-exports for the common use cases.

pub use crate::matching::{
    AccountId, BookUpdate, ErrorCode, FanoutHandler, LevelInfo, MarketHandler, MarketManager,
    NullHandler, Order, OrderBook, OrderBookSnapshot, OrderId, OrderKind, OrderStatus, Price,
    Quantity, Side, Symbol, SymbolId, SymbolKind, TimeInForce,
};
pub use crate::pipeline::MarketRecorder;
pub use crate::risk::{Position, PositionSide, RiskEngine};
pub use crate::store::{BatchWriter, MemoryStore, StoreClient, StoreWorker};
pub use crate::utils::current_time_millis;
