//! Shared helpers for the integration tests.
#![allow(dead_code)]

use matchbook_rs::prelude::*;

/// Sink that records the full event stream for assertions.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    /// Every execution: the order snapshot at fill time, fill price, size.
    pub executions: Vec<(Order, Price, Quantity)>,
    /// Every order removal: snapshot at removal time.
    pub deletions: Vec<Order>,
    /// Every accepted order.
    pub additions: Vec<Order>,
    /// Every order update (stop conversions, trailing moves, reduces).
    pub updates: Vec<Order>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions as (order id, price, quantity) triplets, in event order.
    pub fn fills(&self) -> Vec<(OrderId, Price, Quantity)> {
        self.executions
            .iter()
            .map(|(order, price, quantity)| (order.id, *price, *quantity))
            .collect()
    }

    /// Total executed size for one order id.
    pub fn executed_for(&self, id: OrderId) -> Quantity {
        self.executions
            .iter()
            .filter(|(order, _, _)| order.id == id)
            .map(|(_, _, quantity)| quantity)
            .sum()
    }

    pub fn clear(&mut self) {
        self.executions.clear();
        self.deletions.clear();
        self.additions.clear();
        self.updates.clear();
    }
}

impl MarketHandler for CollectingHandler {
    fn on_add_order(&mut self, order: &Order) {
        self.additions.push(*order);
    }

    fn on_update_order(&mut self, order: &Order) {
        self.updates.push(*order);
    }

    fn on_delete_order(&mut self, order: &Order) {
        self.deletions.push(*order);
    }

    fn on_execute_order(&mut self, order: &Order, price: Price, quantity: Quantity) {
        self.executions.push((*order, price, quantity));
    }
}

/// A ready market: one spot symbol (id 1), book added, matching on.
pub fn spot_market() -> MarketManager<CollectingHandler> {
    let mut market = MarketManager::new(CollectingHandler::new());
    market
        .add_symbol(Symbol::new(1, "X", SymbolKind::Spot, 1, 1))
        .unwrap();
    market.add_order_book(1).unwrap();
    market.enable_matching();
    market
}
