//! The market event sink.
//!
//! The engine reports every lifecycle mutation through a single
//! [`MarketHandler`] trait with one method per event. Callbacks run inside
//! the matching critical section on the engine's serial context: they must
//! not block and must not call back into the market manager. Implementations
//! that need to do real work buffer the events for downstream consumers.

use crate::matching::order::{Order, Price, Quantity, Side};
use crate::matching::symbol::{Symbol, SymbolId};
use serde::{Deserialize, Serialize};

/// Snapshot of one price level, attached to level events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Symbol of the book the level belongs to.
    pub symbol_id: SymbolId,
    /// Side of the book.
    pub side: Side,
    /// Level price.
    pub price: Price,
    /// Aggregate visible quantity at this level.
    pub visible_quantity: Quantity,
    /// Aggregate hidden quantity at this level.
    pub hidden_quantity: Quantity,
    /// Number of resting orders at this level.
    pub order_count: usize,
}

/// Snapshot of an order book's top, attached to book-update events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    /// Symbol of the book.
    pub symbol_id: SymbolId,
    /// Best bid price, if any.
    pub best_bid: Option<Price>,
    /// Best ask price, if any.
    pub best_ask: Option<Price>,
    /// Last traded price, if any trade has occurred.
    pub last_trade_price: Option<Price>,
    /// True when the change touched the top of the book.
    pub top: bool,
}

/// Receiver for the engine's canonical event stream.
///
/// All methods default to no-ops so a sink only implements what it consumes.
pub trait MarketHandler {
    /// A symbol was registered.
    fn on_add_symbol(&mut self, _symbol: &Symbol) {}

    /// A symbol was removed.
    fn on_delete_symbol(&mut self, _symbol: &Symbol) {}

    /// An order book was created.
    fn on_add_order_book(&mut self, _symbol_id: SymbolId) {}

    /// An order book changed; `update.top` marks top-of-book changes.
    fn on_update_order_book(&mut self, _update: &BookUpdate) {}

    /// An order book was removed.
    fn on_delete_order_book(&mut self, _symbol_id: SymbolId) {}

    /// A price level appeared.
    fn on_add_level(&mut self, _level: &LevelInfo, _top: bool) {}

    /// A price level's aggregates changed.
    fn on_update_level(&mut self, _level: &LevelInfo, _top: bool) {}

    /// A price level emptied and was removed.
    fn on_delete_level(&mut self, _level: &LevelInfo, _top: bool) {}

    /// An order was accepted.
    fn on_add_order(&mut self, _order: &Order) {}

    /// An order's open state changed (reduce, modify, stop conversion,
    /// partial fill of a resting order).
    fn on_update_order(&mut self, _order: &Order) {}

    /// An order left the engine (filled, cancelled or replaced).
    fn on_delete_order(&mut self, _order: &Order) {}

    /// `quantity` units of an order executed at `price`. Emitted once per
    /// side of every fill.
    fn on_execute_order(&mut self, _order: &Order, _price: Price, _quantity: Quantity) {}
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl MarketHandler for NullHandler {}

/// Composes several sinks behind one handler; events are forwarded to each
/// sink in registration order.
#[derive(Default)]
pub struct FanoutHandler {
    sinks: Vec<Box<dyn MarketHandler>>,
}

impl FanoutHandler {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sink to the fan-out.
    pub fn push(&mut self, sink: Box<dyn MarketHandler>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sinks are registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MarketHandler for FanoutHandler {
    fn on_add_symbol(&mut self, symbol: &Symbol) {
        for sink in &mut self.sinks {
            sink.on_add_symbol(symbol);
        }
    }

    fn on_delete_symbol(&mut self, symbol: &Symbol) {
        for sink in &mut self.sinks {
            sink.on_delete_symbol(symbol);
        }
    }

    fn on_add_order_book(&mut self, symbol_id: SymbolId) {
        for sink in &mut self.sinks {
            sink.on_add_order_book(symbol_id);
        }
    }

    fn on_update_order_book(&mut self, update: &BookUpdate) {
        for sink in &mut self.sinks {
            sink.on_update_order_book(update);
        }
    }

    fn on_delete_order_book(&mut self, symbol_id: SymbolId) {
        for sink in &mut self.sinks {
            sink.on_delete_order_book(symbol_id);
        }
    }

    fn on_add_level(&mut self, level: &LevelInfo, top: bool) {
        for sink in &mut self.sinks {
            sink.on_add_level(level, top);
        }
    }

    fn on_update_level(&mut self, level: &LevelInfo, top: bool) {
        for sink in &mut self.sinks {
            sink.on_update_level(level, top);
        }
    }

    fn on_delete_level(&mut self, level: &LevelInfo, top: bool) {
        for sink in &mut self.sinks {
            sink.on_delete_level(level, top);
        }
    }

    fn on_add_order(&mut self, order: &Order) {
        for sink in &mut self.sinks {
            sink.on_add_order(order);
        }
    }

    fn on_update_order(&mut self, order: &Order) {
        for sink in &mut self.sinks {
            sink.on_update_order(order);
        }
    }

    fn on_delete_order(&mut self, order: &Order) {
        for sink in &mut self.sinks {
            sink.on_delete_order(order);
        }
    }

    fn on_execute_order(&mut self, order: &Order, price: Price, quantity: Quantity) {
        for sink in &mut self.sinks {
            sink.on_execute_order(order, price, quantity);
        }
    }
}
