//! # Multi-Symbol Derivatives Matching Engine Core
//!
//! A matching engine core for spot and derivative markets: per-symbol order
//! books matched under strict price-time priority, a canonical lifecycle
//! event stream, and an incremental risk pipeline that turns executions into
//! per-account positions with PnL and funding for both vanilla-linear and
//! inverse contracts.
//!
//! ## Key Features
//!
//! - **Order types**: limit, market (with an absolute slippage bound), stop,
//!   stop-limit, trailing stop and trailing stop-limit, with GTC/IOC/FOK/AON
//!   time-in-force policies and iceberg (max-visible) support.
//! - **Deterministic matching**: best price first, FIFO within a level,
//!   all-or-none makers skipped only when the incoming order alone cannot
//!   fill them, fill-or-kill pre-checked against the same plan the kernel
//!   executes.
//! - **Stop machinery**: stop and trailing side-books per direction, a
//!   reference price fed by the last trade with top-of-book fallbacks, and
//!   trailing triggers that only ever tighten, quantized by a trailing step.
//! - **Canonical event stream**: one [`MarketHandler`] callback per symbol,
//!   book, level and order mutation, invoked on the engine's serial context;
//!   multiple sinks compose with [`FanoutHandler`].
//! - **Risk pipeline**: per-(account, symbol) positions with average entry
//!   price, realized/unrealized PnL and incremental funding, using linear or
//!   inverse numerics chosen by the symbol's contract class.
//! - **Batched persistence**: order, transaction and position rows buffer
//!   into fixed-size chunks and move to a store client (optionally on a
//!   background worker thread) without the matcher ever waiting on the
//!   store.
//!
//! ## Design
//!
//! The engine is single-threaded by construction: a
//! [`MarketManager`] owns every book, each public operation runs to
//! completion before the next, and event callbacks happen inside that same
//! critical section. Books keep resting orders in a vector-backed arena
//! (`slab`); price levels and the order-id index store arena slots rather
//! than owning handles, so there are no reference cycles and no per-order
//! allocation on the hot path. All prices and quantities are fixed-point
//! `u64`; only the risk engine uses floating point, and its results are not
//! consensus-critical.
//!
//! ## Example
//!
//! ```
//! use matchbook_rs::prelude::*;
//!
//! let mut market = MarketManager::new(NullHandler);
//! market.add_symbol(Symbol::new(1, "BTCUSDT", SymbolKind::VanillaPerp, 1, 1)).unwrap();
//! market.add_order_book(1).unwrap();
//! market.enable_matching();
//!
//! market.add_order(Order::buy_limit(1, 1, 50_000, 10)).unwrap();
//! market.add_order(Order::sell_limit(2, 1, 50_000, 4)).unwrap();
//!
//! let book = market.order_book(1).unwrap();
//! assert_eq!(book.last_trade_price(), Some(50_000));
//! assert_eq!(market.order(1).unwrap().leaves_quantity, 6);
//! ```

pub mod matching;
pub mod pipeline;
pub mod prelude;
pub mod risk;
pub mod store;
mod utils;

pub use matching::{
    AccountId, BookUpdate, ErrorCode, FanoutHandler, LevelInfo, MarketHandler, MarketManager,
    NullHandler, Order, OrderBook, OrderBookSnapshot, OrderId, OrderKind, OrderStatus, Price,
    PriceLevel, Quantity, Side, Symbol, SymbolId, SymbolKind, SymbolRegistry, TimeInForce,
    UNLIMITED_SLIPPAGE,
};
pub use pipeline::MarketRecorder;
pub use risk::{Position, PositionSide, RiskEngine};
pub use store::{
    BatchWriter, MemoryStore, OrderRow, PositionRow, PriceRow, StoreClient, StoreError,
    StoreWorker, SymbolRow,
};
pub use utils::current_time_millis;
