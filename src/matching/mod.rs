//! The matching core: symbols, orders, price levels, books, the price-time
//! kernel and the market manager that ties them together.

pub mod book;
pub mod errors;
pub mod handler;
pub mod level;
pub mod manager;
pub(crate) mod matcher;
pub mod order;
pub mod symbol;

pub use book::{OrderBook, OrderBookSnapshot};
pub use errors::ErrorCode;
pub use handler::{BookUpdate, FanoutHandler, LevelInfo, MarketHandler, NullHandler};
pub use level::PriceLevel;
pub use manager::MarketManager;
pub use order::{
    AccountId, Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, TimeInForce,
    UNLIMITED_SLIPPAGE,
};
pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolRegistry};

#[cfg(test)]
pub(crate) mod test_support {
    //! Event-collecting sink shared by the unit tests.

    use super::handler::{BookUpdate, LevelInfo, MarketHandler};
    use super::order::{Order, OrderId, OrderStatus, Price, Quantity, Side};
    use super::symbol::{Symbol, SymbolId};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        AddSymbol(SymbolId),
        DeleteSymbol(SymbolId),
        AddBook(SymbolId),
        UpdateBook { top: bool },
        DeleteBook(SymbolId),
        AddLevel { side: Side, price: Price, top: bool },
        UpdateLevel { side: Side, price: Price, visible: Quantity, top: bool },
        DeleteLevel { side: Side, price: Price, top: bool },
        AddOrder(OrderId),
        UpdateOrder { id: OrderId, status: OrderStatus, stop_price: Price },
        DeleteOrder { id: OrderId, status: OrderStatus },
        Execute { id: OrderId, price: Price, quantity: Quantity },
    }

    #[derive(Debug, Default)]
    pub struct RecordingHandler {
        pub events: Vec<Event>,
    }

    impl RecordingHandler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn executions(&self) -> Vec<(OrderId, Price, Quantity)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Execute {
                        id,
                        price,
                        quantity,
                    } => Some((*id, *price, *quantity)),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&mut self) {
            self.events.clear();
        }
    }

    impl MarketHandler for RecordingHandler {
        fn on_add_symbol(&mut self, symbol: &Symbol) {
            self.events.push(Event::AddSymbol(symbol.id));
        }

        fn on_delete_symbol(&mut self, symbol: &Symbol) {
            self.events.push(Event::DeleteSymbol(symbol.id));
        }

        fn on_add_order_book(&mut self, symbol_id: SymbolId) {
            self.events.push(Event::AddBook(symbol_id));
        }

        fn on_update_order_book(&mut self, update: &BookUpdate) {
            self.events.push(Event::UpdateBook { top: update.top });
        }

        fn on_delete_order_book(&mut self, symbol_id: SymbolId) {
            self.events.push(Event::DeleteBook(symbol_id));
        }

        fn on_add_level(&mut self, level: &LevelInfo, top: bool) {
            self.events.push(Event::AddLevel {
                side: level.side,
                price: level.price,
                top,
            });
        }

        fn on_update_level(&mut self, level: &LevelInfo, top: bool) {
            self.events.push(Event::UpdateLevel {
                side: level.side,
                price: level.price,
                visible: level.visible_quantity,
                top,
            });
        }

        fn on_delete_level(&mut self, level: &LevelInfo, top: bool) {
            self.events.push(Event::DeleteLevel {
                side: level.side,
                price: level.price,
                top,
            });
        }

        fn on_add_order(&mut self, order: &Order) {
            self.events.push(Event::AddOrder(order.id));
        }

        fn on_update_order(&mut self, order: &Order) {
            self.events.push(Event::UpdateOrder {
                id: order.id,
                status: order.status,
                stop_price: order.stop_price,
            });
        }

        fn on_delete_order(&mut self, order: &Order) {
            self.events.push(Event::DeleteOrder {
                id: order.id,
                status: order.status,
            });
        }

        fn on_execute_order(&mut self, order: &Order, price: Price, quantity: Quantity) {
            self.events.push(Event::Execute {
                id: order.id,
                price,
                quantity,
            });
        }
    }
}
