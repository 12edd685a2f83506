//! Property tests for the engine invariants over random operation streams.

mod common;

use common::CollectingHandler;
use matchbook_rs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add {
        side: Side,
        price: Price,
        quantity: Quantity,
        time_in_force: TimeInForce,
    },
    Delete {
        pick: usize,
    },
    Reduce {
        pick: usize,
        quantity: Quantity,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (
            prop_oneof![Just(Side::Buy), Just(Side::Sell)],
            90u64..=110,
            1u64..=20,
            prop_oneof![
                3 => Just(TimeInForce::Gtc),
                1 => Just(TimeInForce::Ioc),
                1 => Just(TimeInForce::Fok),
            ],
        )
            .prop_map(|(side, price, quantity, time_in_force)| Op::Add {
                side,
                price,
                quantity,
                time_in_force,
            }),
        1 => (0usize..64).prop_map(|pick| Op::Delete { pick }),
        1 => ((0usize..64), 1u64..=10).prop_map(|(pick, quantity)| Op::Reduce {
            pick,
            quantity,
        }),
    ]
}

struct Run {
    market: MarketManager<CollectingHandler>,
    added: Vec<(OrderId, Quantity, TimeInForce)>,
    next_id: OrderId,
}

impl Run {
    fn new() -> Self {
        let mut market = MarketManager::new(CollectingHandler::new());
        market
            .add_symbol(Symbol::new(1, "PROP", SymbolKind::VanillaPerp, 1, 1))
            .unwrap();
        market.add_order_book(1).unwrap();
        market.enable_matching();
        Self {
            market,
            added: Vec::new(),
            next_id: 1,
        }
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Add {
                side,
                price,
                quantity,
                time_in_force,
            } => {
                let id = self.next_id;
                self.next_id += 1;
                let account = id % 3;
                let order = Order::limit(id, 1, *side, *price, *quantity)
                    .with_time_in_force(*time_in_force)
                    .with_account(account);
                self.market.add_order(order).unwrap();
                self.added.push((id, *quantity, *time_in_force));
            }
            Op::Delete { pick } => {
                if let Some((id, _, _)) = self.added.get(pick % self.added.len().max(1)) {
                    let _ = self.market.delete_order(*id);
                }
            }
            Op::Reduce { pick, quantity } => {
                if let Some((id, _, _)) = self.added.get(pick % self.added.len().max(1)) {
                    let _ = self.market.reduce_order(*id, *quantity);
                }
            }
        }
    }

    fn assert_book_invariants(&self) {
        let book = self.market.order_book(1).unwrap();
        // Invariant: no resting crossed book (stream contains no AON).
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(
                bid.price() < ask.price(),
                "crossed book: bid {} >= ask {}",
                bid.price(),
                ask.price()
            );
        }
        // Invariant: no empty level is observable.
        let snapshot = book.snapshot();
        for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
            assert!(level.order_count > 0, "empty level at {}", level.price);
            assert!(
                level.visible_quantity + level.hidden_quantity > 0,
                "zero-quantity level at {}",
                level.price
            );
        }
        // Invariant: per-order quantity conservation for live orders.
        for (id, quantity, _) in &self.added {
            if let Some(order) = self.market.order(*id) {
                assert_eq!(
                    order.executed_quantity + order.leaves_quantity,
                    order.quantity
                );
                assert!(order.quantity <= *quantity);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_book_invariants_hold_over_random_streams(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut run = Run::new();
        for op in &ops {
            run.apply(op);
            run.assert_book_invariants();
        }
    }

    #[test]
    fn prop_fills_come_in_matched_pairs(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut run = Run::new();
        for op in &ops {
            run.apply(op);
        }
        let executions = &run.market.handler().executions;
        // Every fill reports both sides: same price and size, back to back.
        prop_assert_eq!(executions.len() % 2, 0);
        for pair in executions.chunks(2) {
            let (maker, maker_price, maker_qty) = &pair[0];
            let (taker, taker_price, taker_qty) = &pair[1];
            prop_assert_eq!(maker_price, taker_price);
            prop_assert_eq!(maker_qty, taker_qty);
            prop_assert_ne!(maker.side, taker.side);
        }
    }

    #[test]
    fn prop_fok_fills_fully_or_not_at_all(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut run = Run::new();
        for op in &ops {
            run.apply(op);
        }
        let handler = run.market.handler();
        for (id, quantity, time_in_force) in &run.added {
            if *time_in_force == TimeInForce::Fok {
                let executed = handler.executed_for(*id);
                prop_assert!(
                    executed == 0 || executed == *quantity,
                    "FOK {} filled partially: {}/{}",
                    id,
                    executed,
                    quantity
                );
            }
        }
    }

    #[test]
    fn prop_positions_track_signed_execution_sums(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut run = Run::new();
        for op in &ops {
            run.apply(op);
        }

        // Fold the execution stream into the risk engine and into a plain
        // signed sum per account; they must agree.
        let symbol = Symbol::new(1, "PROP", SymbolKind::VanillaPerp, 1, 1);
        let mut risk = RiskEngine::new();
        let mut net: std::collections::HashMap<u64, i64> = std::collections::HashMap::new();
        for (order, price, quantity) in &run.market.handler().executions {
            risk.order_executed(&symbol, order, *price, *quantity);
            let signed = match order.side {
                Side::Buy => *quantity as i64,
                Side::Sell => -(*quantity as i64),
            };
            *net.entry(order.account_id).or_default() += signed;
        }
        for (account, expected) in net {
            let position = risk.position(account, 1).unwrap();
            prop_assert_eq!(position.signed_quantity(), expected);
            prop_assert_eq!(position.quantity, expected.unsigned_abs());
        }
    }
}
