//! The price-time matching kernel.
//!
//! Free functions over one book and one incoming (taker) order. The kernel
//! walks the opposite side best-price-first and each level FIFO, applying
//! the all-or-none skip rule, iceberg visibility and slippage-capped limits.
//! All event emission happens here so the manager's operation code stays at
//! the lifecycle level.

use crate::matching::book::OrderBook;
use crate::matching::handler::{BookUpdate, MarketHandler};
use crate::matching::level::PriceLevel;
use crate::matching::order::{Order, OrderId, Price, Quantity, Side};
use std::ops::Bound;
use tracing::trace;

/// What a kernel pass did.
#[derive(Debug, Default)]
pub(crate) struct WalkOutcome {
    /// Total quantity executed for the taker.
    pub executed: Quantity,
    /// Ids of fully filled makers, for the manager's global index.
    pub removed_ids: Vec<OrderId>,
}

/// Builds the book-update event payload.
pub(crate) fn book_update(book: &OrderBook, top: bool) -> BookUpdate {
    BookUpdate {
        symbol_id: book.symbol().id,
        best_bid: book.best_bid().map(|l| l.price()),
        best_ask: book.best_ask().map(|l| l.price()),
        last_trade_price: book.last_trade_price(),
        top,
    }
}

fn crossing(side: Side, maker_price: Price, limit: Price) -> bool {
    match side {
        Side::Buy => maker_price <= limit,
        Side::Sell => maker_price >= limit,
    }
}

/// Effective price limit for a market execution: the first touched opposite
/// level shifted by the order's slippage bound. `None` when the opposite
/// side is empty.
pub(crate) fn market_limit(book: &OrderBook, order: &Order) -> Option<Price> {
    match order.side {
        Side::Buy => book
            .best_ask()
            .map(|l| l.price().saturating_add(order.slippage)),
        Side::Sell => book
            .best_bid()
            .map(|l| l.price().saturating_sub(order.slippage)),
    }
}

/// Simulates a kernel pass without mutating anything, using the exact maker
/// selection rules of [`execute_walk`]. Returns the fillable quantity.
///
/// This single pass backs both the fill-or-kill pre-check and the resting
/// decision for incoming all-or-none orders.
pub(crate) fn plan_fill(book: &OrderBook, taker: &Order, limit: Price) -> Quantity {
    let mut remaining = taker.leaves_quantity;

    let levels: Box<dyn Iterator<Item = (&Price, &PriceLevel)> + '_> = match taker.side {
        Side::Buy => Box::new(book.asks.iter()),
        Side::Sell => Box::new(book.bids.iter().rev()),
    };
    for (&price, level) in levels {
        if remaining == 0 || !crossing(taker.side, price, limit) {
            break;
        }
        for (_, maker) in level.iter(&book.arena) {
            if remaining == 0 {
                break;
            }
            if maker.is_aon() {
                // An AON maker only participates when this order alone can
                // consume its whole leaves quantity.
                if maker.leaves_quantity <= remaining {
                    remaining -= maker.leaves_quantity;
                }
                continue;
            }
            // Iceberg tranches replenish during the walk, so a plain maker
            // contributes its full open quantity.
            remaining -= maker.leaves_quantity.min(remaining);
        }
    }
    taker.leaves_quantity - remaining
}

/// Consumes the opposite side of the book with the incoming order until the
/// order is exhausted, the side is empty or prices stop crossing.
///
/// The taker's `price` field is the limit (market orders carry their
/// slippage-capped effective limit there). Emits the full event sequence per
/// fill: maker execute, taker execute, maker update/delete, level event,
/// book update.
pub(crate) fn execute_walk<H: MarketHandler>(
    book: &mut OrderBook,
    handler: &mut H,
    taker: &mut Order,
) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();
    let taker_side = taker.side;
    let limit = taker.price;
    let mut price_cursor: Option<Price> = None;

    'levels: loop {
        if taker.leaves_quantity == 0 {
            break;
        }
        // Next opposite level in price order. Levels left behind by the AON
        // skip rule are stepped over via the exclusive cursor.
        let maker_price = match taker_side {
            Side::Buy => match price_cursor {
                None => book.asks.first_key_value().map(|(p, _)| *p),
                Some(prev) => book
                    .asks
                    .range((Bound::Excluded(prev), Bound::Unbounded))
                    .next()
                    .map(|(p, _)| *p),
            },
            Side::Sell => match price_cursor {
                None => book.bids.last_key_value().map(|(p, _)| *p),
                Some(prev) => book
                    .bids
                    .range((Bound::Unbounded, Bound::Excluded(prev)))
                    .next_back()
                    .map(|(p, _)| *p),
            },
        };
        let Some(maker_price) = maker_price else {
            break;
        };
        if !crossing(taker_side, maker_price, limit) {
            break;
        }
        price_cursor = Some(maker_price);

        let mut cursor = book
            .level(taker_side.opposite(), maker_price)
            .and_then(|l| l.front());
        while let Some(slot) = cursor {
            if taker.leaves_quantity == 0 {
                break 'levels;
            }
            let (maker_aon, maker_leaves, maker_visible, maker_next) = {
                let maker = &book.arena[slot];
                (
                    maker.is_aon(),
                    maker.leaves_quantity,
                    maker.visible_quantity(),
                    maker.next,
                )
            };
            if maker_aon && maker_leaves > taker.leaves_quantity {
                // Cannot fill the AON maker in full with this order alone;
                // it keeps resting and the walk resumes with the next order
                // at the same price.
                cursor = maker_next;
                continue;
            }
            let fill = if maker_aon {
                maker_leaves
            } else {
                maker_visible.min(taker.leaves_quantity)
            };

            let (maker_after, mutation) = book.fill_maker(slot, fill);
            taker.fill(fill);
            book.last_trade_price = Some(maker_price);
            outcome.executed += fill;

            trace!(
                "executed {} @ {} (maker {}, taker {})",
                fill, maker_price, maker_after.id, taker.id
            );

            handler.on_execute_order(&maker_after, maker_price, fill);
            handler.on_execute_order(taker, maker_price, fill);
            if maker_after.leaves_quantity == 0 {
                handler.on_delete_order(&maker_after);
                outcome.removed_ids.push(maker_after.id);
            } else {
                handler.on_update_order(&maker_after);
            }
            if mutation.level_edge {
                handler.on_delete_level(&mutation.info, mutation.top);
            } else {
                handler.on_update_level(&mutation.info, mutation.top);
            }
            handler.on_update_order_book(&book_update(book, mutation.top));

            cursor = if maker_after.leaves_quantity == 0 {
                maker_next
            } else {
                // Iceberg tranche replenished in place; keep working the
                // same front order.
                Some(slot)
            };
        }
    }
    outcome
}

/// Runs the incoming order through the kernel, honoring the FOK pre-check
/// and the all-or-none resting rule: when the plan cannot cover the full
/// quantity, a FOK or AON taker executes nothing (the caller then cancels
/// or rests it).
pub(crate) fn run_taker<H: MarketHandler>(
    book: &mut OrderBook,
    handler: &mut H,
    taker: &mut Order,
) -> WalkOutcome {
    if (taker.is_fok() || taker.is_aon()) && plan_fill(book, taker, taker.price) < taker.leaves_quantity
    {
        return WalkOutcome::default();
    }
    execute_walk(book, handler, taker)
}

/// Converts a trailing offset pair into absolute ticks against `reference`.
/// Negative values are percentages in 0.01% units.
fn trailing_offsets(order: &Order, reference: Price) -> (Price, Price) {
    if order.trailing_distance < 0 {
        let pct = |v: i64| ((v.unsigned_abs() as u128 * reference as u128) / 10_000) as u64;
        (pct(order.trailing_distance), pct(order.trailing_step))
    } else {
        (
            order.trailing_distance as u64,
            order.trailing_step.max(0) as u64,
        )
    }
}

/// First stop price of a trailing order entering the book: the raw offset
/// from the reference, with no step gate.
pub(crate) fn initial_trailing_stop(order: &Order, reference: Price) -> Price {
    let (distance, _) = trailing_offsets(order, reference);
    match order.side {
        Side::Buy => reference.saturating_add(distance),
        Side::Sell => reference.saturating_sub(distance),
    }
}

/// Recomputed stop price after a top-of-book move. Trailing stops only
/// tighten: a buy stop never rises, a sell stop never falls, and a move
/// smaller than the trailing step is ignored.
pub(crate) fn recalculated_trailing_stop(order: &Order, reference: Price) -> Price {
    let (distance, step) = trailing_offsets(order, reference);
    let old = order.stop_price;
    match order.side {
        Side::Buy => {
            let new = reference.saturating_add(distance);
            if new < old && old - new >= step { new } else { old }
        }
        Side::Sell => {
            let new = reference.saturating_sub(distance);
            if new > old && new - old >= step { new } else { old }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::handler::NullHandler;
    use crate::matching::order::TimeInForce;
    use crate::matching::symbol::{Symbol, SymbolKind};

    fn book() -> OrderBook {
        OrderBook::new(Symbol::new(1, "TEST", SymbolKind::Spot, 1, 1))
    }

    #[test]
    fn test_walk_respects_price_time_priority() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 101, 5));
        book.rest_order(Order::sell_limit(2, 1, 100, 5));
        book.rest_order(Order::sell_limit(3, 1, 100, 5));

        let mut taker = Order::buy_limit(4, 1, 101, 12);
        let outcome = execute_walk(&mut book, &mut NullHandler, &mut taker);

        assert_eq!(outcome.executed, 12);
        // 100-level orders in FIFO order first, then the 101 level.
        assert_eq!(outcome.removed_ids, vec![2, 3]);
        assert_eq!(book.order(1).map(|o| o.leaves_quantity), Some(3));
        assert_eq!(book.last_trade_price(), Some(101));
    }

    #[test]
    fn test_walk_stops_at_limit() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 5));
        book.rest_order(Order::sell_limit(2, 1, 102, 5));

        let mut taker = Order::buy_limit(3, 1, 100, 10);
        let outcome = execute_walk(&mut book, &mut NullHandler, &mut taker);

        assert_eq!(outcome.executed, 5);
        assert_eq!(taker.leaves_quantity, 5);
        assert_eq!(book.best_ask().map(|l| l.price()), Some(102));
    }

    #[test]
    fn test_aon_maker_skipped_then_later_order_fills() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 10).with_time_in_force(TimeInForce::Aon));
        book.rest_order(Order::sell_limit(2, 1, 100, 4));

        // Taker too small for the AON front order: it leapfrogs to order 2.
        let mut taker = Order::buy_limit(3, 1, 100, 4);
        let outcome = execute_walk(&mut book, &mut NullHandler, &mut taker);

        assert_eq!(outcome.executed, 4);
        assert_eq!(outcome.removed_ids, vec![2]);
        // AON order untouched and still resting.
        assert_eq!(book.order(1).map(|o| o.leaves_quantity), Some(10));
    }

    #[test]
    fn test_aon_maker_fills_in_full_when_consumable() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 10).with_time_in_force(TimeInForce::Aon));

        let mut taker = Order::buy_limit(2, 1, 100, 15);
        let outcome = execute_walk(&mut book, &mut NullHandler, &mut taker);

        assert_eq!(outcome.executed, 10);
        assert_eq!(taker.leaves_quantity, 5);
        assert!(book.order(1).is_none());
    }

    #[test]
    fn test_iceberg_maker_replenishes_within_one_walk() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 30).with_max_visible(10));

        struct CountExecutes(usize);
        impl MarketHandler for CountExecutes {
            fn on_execute_order(&mut self, _o: &Order, _p: Price, _q: Quantity) {
                self.0 += 1;
            }
        }
        let mut counter = CountExecutes(0);
        let mut taker = Order::buy_limit(2, 1, 100, 25);
        let outcome = execute_walk(&mut book, &mut counter, &mut taker);

        assert_eq!(outcome.executed, 25);
        // Three visible tranches (10+10+5), two executes per fill.
        assert_eq!(counter.0, 6);
        assert_eq!(book.order(1).map(|o| o.leaves_quantity), Some(5));
    }

    #[test]
    fn test_plan_fill_matches_execution() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 10).with_time_in_force(TimeInForce::Aon));
        book.rest_order(Order::sell_limit(2, 1, 100, 4));
        book.rest_order(Order::sell_limit(3, 1, 101, 6));

        // Plan for a 6-lot: the AON (10) is skipped, 4 at 100 + 2 at 101.
        let taker = Order::buy_limit(9, 1, 101, 6);
        assert_eq!(plan_fill(&book, &taker, 101), 6);

        // Plan for a 20-lot at 101: AON 10 + 4 + 6 = 20.
        let taker = Order::buy_limit(9, 1, 101, 20);
        assert_eq!(plan_fill(&book, &taker, 101), 20);

        // Limited to 100: AON 10 + 4.
        let taker = Order::buy_limit(9, 1, 100, 20);
        assert_eq!(plan_fill(&book, &taker, 100), 14);
    }

    #[test]
    fn test_run_taker_fok_kills_without_fills() {
        let mut book = book();
        book.rest_order(Order::buy_limit(1, 1, 100, 6));

        let mut taker =
            Order::sell_limit(2, 1, 100, 10).with_time_in_force(TimeInForce::Fok);
        let outcome = run_taker(&mut book, &mut NullHandler, &mut taker);

        assert_eq!(outcome.executed, 0);
        assert_eq!(taker.leaves_quantity, 10);
        assert_eq!(book.order(1).map(|o| o.leaves_quantity), Some(6));
    }

    #[test]
    fn test_market_limit_applies_slippage() {
        let mut book = book();
        book.rest_order(Order::sell_limit(1, 1, 100, 5));

        let order = Order::buy_market(2, 1, 5).with_slippage(3);
        assert_eq!(market_limit(&book, &order), Some(103));

        let unbounded = Order::buy_market(3, 1, 5);
        assert_eq!(market_limit(&book, &unbounded), Some(Price::MAX));

        let sell = Order::sell_market(4, 1, 5).with_slippage(2);
        assert_eq!(market_limit(&book, &sell), None); // no bids
    }

    #[test]
    fn test_trailing_stop_recompute_quantization() {
        // Sell trailing stop, distance 5, step 1 (S5 shape).
        let mut order = Order::trailing_stop(1, 1, Side::Sell, 1, 5, 1);
        order.stop_price = initial_trailing_stop(&order, 100);
        assert_eq!(order.stop_price, 95);

        assert_eq!(recalculated_trailing_stop(&order, 103), 98);
        order.stop_price = 98;
        // Never widens.
        assert_eq!(recalculated_trailing_stop(&order, 101), 98);
        // A sub-step improvement is ignored only when below the step.
        let mut stepped = order;
        stepped.trailing_step = 4;
        assert_eq!(recalculated_trailing_stop(&stepped, 105), 98);
        assert_eq!(recalculated_trailing_stop(&stepped, 107), 102);
    }

    #[test]
    fn test_trailing_percentage_offsets() {
        // -500 = 5% of the reference.
        let mut order = Order::trailing_stop(1, 1, Side::Buy, 1, -500, 0);
        order.stop_price = initial_trailing_stop(&order, 200);
        assert_eq!(order.stop_price, 210);
    }
}
