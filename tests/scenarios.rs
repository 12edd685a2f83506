//! End-to-end lifecycle scenarios driven through the public surface.

mod common;

use common::{spot_market, CollectingHandler};
use matchbook_rs::prelude::*;
use matchbook_rs::MemoryStore;

#[test]
fn test_simple_cross_partial_fill() {
    let mut market = spot_market();

    market.add_order(Order::buy_limit(1, 1, 100, 10)).unwrap();
    market.add_order(Order::sell_limit(2, 1, 100, 4)).unwrap();

    let handler = market.handler();
    assert_eq!(handler.fills(), vec![(1, 100, 4), (2, 100, 4)]);
    let deleted: Vec<OrderId> = handler.deletions.iter().map(|o| o.id).collect();
    assert_eq!(deleted, vec![2]);
    assert_eq!(handler.deletions[0].status, OrderStatus::Filled);

    let book = market.order_book(1).unwrap();
    assert_eq!(book.best_bid().map(|l| l.price()), Some(100));
    assert_eq!(book.best_bid().map(|l| l.visible_quantity()), Some(6));
    assert_eq!(market.order(1).unwrap().leaves_quantity, 6);
}

#[test]
fn test_fok_fails_without_any_fill() {
    let mut market = spot_market();
    market.add_order(Order::buy_limit(1, 1, 100, 6)).unwrap();
    market.handler_mut().clear();

    let result = market.add_order(
        Order::sell_limit(2, 1, 100, 10).with_time_in_force(TimeInForce::Fok),
    );

    // The FOK policy cancels silently: the add itself succeeds.
    assert!(result.is_ok());
    let handler = market.handler();
    assert!(handler.executions.is_empty());
    assert_eq!(handler.deletions.len(), 1);
    assert_eq!(handler.deletions[0].status, OrderStatus::Cancelled);

    // Book unchanged.
    let book = market.order_book(1).unwrap();
    assert_eq!(book.best_bid().map(|l| l.visible_quantity()), Some(6));
    assert!(book.best_ask().is_none());
}

#[test]
fn test_ioc_partial_fill_cancels_remainder() {
    let mut market = spot_market();
    market.add_order(Order::sell_limit(1, 1, 99, 2)).unwrap();
    market.add_order(Order::sell_limit(2, 1, 100, 3)).unwrap();

    market
        .add_order(Order::buy_limit(3, 1, 100, 10).with_time_in_force(TimeInForce::Ioc))
        .unwrap();

    let handler = market.handler();
    assert_eq!(
        handler.fills(),
        vec![(1, 99, 2), (3, 99, 2), (2, 100, 3), (3, 100, 3)]
    );
    assert_eq!(handler.executed_for(3), 5);
    // Remaining 5 cancelled, nothing rests.
    assert!(market.order(3).is_none());
    let book = market.order_book(1).unwrap();
    assert!(book.best_bid().is_none());
    assert!(book.best_ask().is_none());
}

#[test]
fn test_stop_activates_on_trade_and_matches_best_ask() {
    let mut market = spot_market();
    market
        .add_order(Order::stop(10, 1, Side::Buy, 105, 1))
        .unwrap();
    assert_eq!(market.order(10).unwrap().status, OrderStatus::Pending);

    // Produce a trade at 106.
    market.add_order(Order::sell_limit(1, 1, 106, 2)).unwrap();
    market.add_order(Order::buy_limit(2, 1, 106, 1)).unwrap();

    // The stop converted to a market order and lifted the remaining ask.
    let handler = market.handler();
    assert!(handler.fills().contains(&(10, 106, 1)));
    assert!(market.order(10).is_none());
    let book = market.order_book(1).unwrap();
    assert!(book.best_ask().is_none());
}

#[test]
fn test_trailing_stop_tightens_and_never_widens() {
    let mut market = spot_market();
    market.add_order(Order::buy_limit(1, 1, 100, 10)).unwrap();

    market
        .add_order(Order::trailing_stop(2, 1, Side::Sell, 1, 5, 1))
        .unwrap();
    assert_eq!(market.order(2).unwrap().stop_price, 95);

    market.add_order(Order::buy_limit(3, 1, 103, 10)).unwrap();
    assert_eq!(market.order(2).unwrap().stop_price, 98);

    // Best bid falls back; trailing stops do not widen.
    market.delete_order(3).unwrap();
    assert_eq!(market.order(2).unwrap().stop_price, 98);
}

#[test]
fn test_inverse_round_trip_realizes_base_denominated_pnl() {
    let store = MemoryStore::new();
    let recorder = MarketRecorder::with_settings(store, 1, 1);
    let mut market = MarketManager::new(recorder);
    market
        .add_symbol(Symbol::new(1, "INVPERP", SymbolKind::InversePerp, 1, 1))
        .unwrap();
    market.add_order_book(1).unwrap();
    market.enable_matching();

    // Account 1 goes long 1 @ 100 against account 2.
    market
        .add_order(Order::sell_limit(1, 1, 100, 1).with_account(2))
        .unwrap();
    market
        .add_order(Order::buy_limit(2, 1, 100, 1).with_account(1))
        .unwrap();
    // ... and closes at 125.
    market
        .add_order(Order::buy_limit(3, 1, 125, 1).with_account(2))
        .unwrap();
    market
        .add_order(Order::sell_limit(4, 1, 125, 1).with_account(1))
        .unwrap();

    let position = market.handler().position(1, 1).unwrap();
    assert_eq!(position.quantity, 0);
    // 1 * (1/100 - 1/125) = 0.002
    assert!((position.realized_pnl - 0.002).abs() < 1e-12);
    assert_eq!(position.unrealized_pnl, 0.0);
}

#[test]
fn test_replace_then_cross_uses_new_terms() {
    let mut market = spot_market();
    market.add_order(Order::buy_limit(1, 1, 98, 10)).unwrap();
    market.replace_order(1, 2, 100, 5).unwrap();

    market.add_order(Order::sell_limit(3, 1, 100, 5)).unwrap();
    let handler = market.handler();
    assert_eq!(handler.fills(), vec![(2, 100, 5), (3, 100, 5)]);
    assert!(market.order(2).is_none());
}

#[test]
fn test_fanout_composes_sinks() {
    let mut fanout = FanoutHandler::new();
    fanout.push(Box::new(CollectingHandler::new()));
    fanout.push(Box::new(NullHandler));

    let mut market = MarketManager::new(fanout);
    market
        .add_symbol(Symbol::new(1, "X", SymbolKind::Spot, 1, 1))
        .unwrap();
    market.add_order_book(1).unwrap();
    market.enable_matching();
    market.add_order(Order::buy_limit(1, 1, 100, 1)).unwrap();
    market.add_order(Order::sell_limit(2, 1, 100, 1)).unwrap();

    // Both sinks saw the trade without interfering with matching.
    assert!(market.order_book(1).unwrap().last_trade_price() == Some(100));
}
