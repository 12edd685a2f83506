//! Per-symbol order book.
//!
//! A book keeps bid and ask levels in price-ordered maps, plus four stop
//! side-books (stop and trailing-stop, per side) so activation scans only
//! ever visit the triggered subset. Resting orders live in a vector-backed
//! arena (`slab`); levels and the order-id index hold arena slots, never
//! owning handles.

use crate::matching::handler::LevelInfo;
use crate::matching::level::PriceLevel;
use crate::matching::order::{Order, OrderId, OrderStatus, Price, Quantity, Side};
use crate::matching::symbol::{Symbol, SymbolId};
use serde::{Deserialize, Serialize};
use slab::Slab;
use std::collections::{BTreeMap, HashMap};

/// Serializable view of a book's resting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Symbol of the book.
    pub symbol_id: SymbolId,
    /// Bid levels, best (highest) first.
    pub bids: Vec<LevelInfo>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<LevelInfo>,
    /// Last traded price, if any.
    pub last_trade_price: Option<Price>,
}

/// Result of resting an order into a level: what the event stream needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelMutation {
    /// Arena slot of the affected order.
    pub slot: usize,
    /// True when the mutation created or removed the level.
    pub level_edge: bool,
    /// Level snapshot after the mutation (zeroed for removed levels).
    pub info: LevelInfo,
    /// True when the affected level was the top of its side.
    pub top: bool,
}

/// A per-symbol order book with stop and trailing side-books.
#[derive(Debug)]
pub struct OrderBook {
    symbol: Symbol,
    /// Arena of resting orders; levels link through it.
    pub(crate) arena: Slab<Order>,
    /// Order id to arena slot.
    pub(crate) ids: HashMap<OrderId, usize>,
    /// Bid levels by price; the best bid is the greatest key.
    pub(crate) bids: BTreeMap<Price, PriceLevel>,
    /// Ask levels by price; the best ask is the least key.
    pub(crate) asks: BTreeMap<Price, PriceLevel>,
    /// Parked buy stops by stop price, scanned from the least key.
    pub(crate) buy_stops: BTreeMap<Price, PriceLevel>,
    /// Parked sell stops by stop price, scanned from the greatest key.
    pub(crate) sell_stops: BTreeMap<Price, PriceLevel>,
    /// Parked buy trailing stops by stop price.
    pub(crate) trailing_buy_stops: BTreeMap<Price, PriceLevel>,
    /// Parked sell trailing stops by stop price.
    pub(crate) trailing_sell_stops: BTreeMap<Price, PriceLevel>,
    /// Price of the most recent execution on this book.
    pub(crate) last_trade_price: Option<Price>,
    /// Best ask seen by the last trailing recompute (buy trailing stops).
    pub(crate) trailing_ask_anchor: Option<Price>,
    /// Best bid seen by the last trailing recompute (sell trailing stops).
    pub(crate) trailing_bid_anchor: Option<Price>,
    next_seq: u64,
}

impl OrderBook {
    /// Creates an empty book for the given symbol.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            arena: Slab::new(),
            ids: HashMap::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            buy_stops: BTreeMap::new(),
            sell_stops: BTreeMap::new(),
            trailing_buy_stops: BTreeMap::new(),
            trailing_sell_stops: BTreeMap::new(),
            last_trade_price: None,
            trailing_ask_anchor: None,
            trailing_bid_anchor: None,
            next_seq: 1,
        }
    }

    /// The symbol this book trades.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The best (highest) bid level, if any.
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.last_key_value().map(|(_, level)| level)
    }

    /// The best (lowest) ask level, if any.
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first_key_value().map(|(_, level)| level)
    }

    /// The price of the most recent execution on this book.
    pub fn last_trade_price(&self) -> Option<Price> {
        self.last_trade_price
    }

    /// Bid levels, best first.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values().rev()
    }

    /// Ask levels, best first.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Looks up a resting or parked order by id.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.ids.get(&id).map(|&slot| &self.arena[slot])
    }

    /// Number of resting and parked orders.
    pub fn order_count(&self) -> usize {
        self.arena.len()
    }

    /// The level at `price` on `side` of the market book, if present.
    pub fn level(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        }
    }

    /// Activation reference price for buy stops: last trade, else best ask.
    pub(crate) fn stop_reference_ask(&self) -> Option<Price> {
        self.last_trade_price
            .or_else(|| self.best_ask().map(|l| l.price()))
    }

    /// Activation reference price for sell stops: last trade, else best bid.
    pub(crate) fn stop_reference_bid(&self) -> Option<Price> {
        self.last_trade_price
            .or_else(|| self.best_bid().map(|l| l.price()))
    }

    /// Trailing recompute reference: the best price opposite the stop's
    /// direction of protection (asks for buy stops, bids for sell stops).
    pub(crate) fn trailing_reference(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.best_ask().map(|l| l.price()),
            Side::Sell => self.best_bid().map(|l| l.price()),
        }
    }

    /// Hands out the next insertion sequence number.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// True when `price` is the top of `side` in the market book.
    pub fn is_top(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.bids.last_key_value().map(|(p, _)| *p) == Some(price),
            Side::Sell => self.asks.first_key_value().map(|(p, _)| *p) == Some(price),
        }
    }

    fn make_level_info(symbol_id: SymbolId, side: Side, level: &PriceLevel) -> LevelInfo {
        LevelInfo {
            symbol_id,
            side,
            price: level.price(),
            visible_quantity: level.visible_quantity(),
            hidden_quantity: level.hidden_quantity(),
            order_count: level.order_count(),
        }
    }

    /// Rests a limit order into the market book at its limit price.
    ///
    /// Assigns the insertion sequence unless the order already carries one
    /// (re-resting during a crossed-book pass keeps priority metadata).
    pub(crate) fn rest_order(&mut self, mut order: Order) -> LevelMutation {
        if order.seq == 0 {
            order.seq = self.next_seq();
        }
        let symbol_id = self.symbol.id;
        let side = order.side;
        let price = order.price;
        let id = order.id;
        let slot = self.arena.insert(order);
        self.ids.insert(id, slot);

        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level_edge = !map.contains_key(&price);
        let level = map.entry(price).or_insert_with(|| PriceLevel::new(price));
        level.push_back(&mut self.arena, slot);
        let info = Self::make_level_info(symbol_id, side, level);
        let top = self.is_top(side, price);
        LevelMutation {
            slot,
            level_edge,
            info,
            top,
        }
    }

    /// Parks a stop-family order into the matching side-book, keyed by its
    /// stop price.
    pub(crate) fn park_stop(&mut self, mut order: Order) -> usize {
        if order.seq == 0 {
            order.seq = self.next_seq();
        }
        order.status = OrderStatus::Pending;
        let trailing = order.kind.is_trailing();
        let side = order.side;
        let key = order.stop_price;
        let id = order.id;
        let slot = self.arena.insert(order);
        self.ids.insert(id, slot);

        let map = match (trailing, side) {
            (false, Side::Buy) => &mut self.buy_stops,
            (false, Side::Sell) => &mut self.sell_stops,
            (true, Side::Buy) => &mut self.trailing_buy_stops,
            (true, Side::Sell) => &mut self.trailing_sell_stops,
        };
        map.entry(key)
            .or_insert_with(|| PriceLevel::new(key))
            .push_back(&mut self.arena, slot);
        slot
    }

    /// Removes an order from whichever level holds it and releases its arena
    /// slot. Returns the order together with the level event data (only
    /// meaningful for market-book orders).
    pub(crate) fn unrest(&mut self, slot: usize) -> (Order, LevelMutation) {
        let order = self.arena[slot];
        let symbol_id = self.symbol.id;
        let parked = order.status == OrderStatus::Pending;
        let (map, key) = if parked {
            let map = match (order.kind.is_trailing(), order.side) {
                (false, Side::Buy) => &mut self.buy_stops,
                (false, Side::Sell) => &mut self.sell_stops,
                (true, Side::Buy) => &mut self.trailing_buy_stops,
                (true, Side::Sell) => &mut self.trailing_sell_stops,
            };
            (map, order.stop_price)
        } else {
            let map = match order.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            (map, order.price)
        };

        let top = if parked {
            false
        } else {
            match order.side {
                Side::Buy => map.last_key_value().map(|(p, _)| *p) == Some(key),
                Side::Sell => map.first_key_value().map(|(p, _)| *p) == Some(key),
            }
        };

        let level = map.get_mut(&key).expect("order level must exist");
        level.unlink(&mut self.arena, slot);
        let level_edge = level.is_empty();
        let info = if level_edge {
            let info = Self::make_level_info(symbol_id, order.side, level);
            map.remove(&key);
            info
        } else {
            Self::make_level_info(symbol_id, order.side, level)
        };

        self.ids.remove(&order.id);
        let mut order = self.arena.remove(slot);
        order.prev = None;
        order.next = None;
        (order, LevelMutation {
            slot,
            level_edge,
            info,
            top,
        })
    }

    /// Reduces a resting or parked order's open quantity in place by
    /// `delta`, keeping `executed + leaves == quantity`. The caller
    /// guarantees `delta <= leaves` and `delta < leaves` implies the order
    /// stays.
    pub(crate) fn reduce_in_place(&mut self, slot: usize, delta: Quantity) -> LevelMutation {
        let symbol_id = self.symbol.id;
        let (side, parked, trailing, key, old, new) = {
            let order = &mut self.arena[slot];
            let old = (order.visible_quantity(), order.hidden_quantity());
            order.quantity -= delta;
            order.leaves_quantity -= delta;
            let new = (order.visible_quantity(), order.hidden_quantity());
            (
                order.side,
                order.status == OrderStatus::Pending,
                order.kind.is_trailing(),
                if order.status == OrderStatus::Pending {
                    order.stop_price
                } else {
                    order.price
                },
                old,
                new,
            )
        };
        let map = if parked {
            match (trailing, side) {
                (false, Side::Buy) => &mut self.buy_stops,
                (false, Side::Sell) => &mut self.sell_stops,
                (true, Side::Buy) => &mut self.trailing_buy_stops,
                (true, Side::Sell) => &mut self.trailing_sell_stops,
            }
        } else {
            match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            }
        };
        let level = map.get_mut(&key).expect("order level must exist");
        level.update_quantities(old, new);
        let info = Self::make_level_info(symbol_id, side, level);
        let top = !parked && self.is_top(side, key);
        LevelMutation {
            slot,
            level_edge: false,
            info,
            top,
        }
    }

    /// Applies a fill of `quantity` to the resting maker at `slot`: updates
    /// the order's counters and the level aggregates, and removes the maker
    /// (and its level, when emptied) once fully filled. An iceberg maker's
    /// visible tranche replenishes from hidden in place.
    ///
    /// Returns the maker snapshot after the fill and the level event data.
    pub(crate) fn fill_maker(&mut self, slot: usize, quantity: Quantity) -> (Order, LevelMutation) {
        let symbol_id = self.symbol.id;
        let (snapshot, side, price, old, new) = {
            let order = &mut self.arena[slot];
            let old = (order.visible_quantity(), order.hidden_quantity());
            order.fill(quantity);
            let new = (order.visible_quantity(), order.hidden_quantity());
            (*order, order.side, order.price, old, new)
        };
        let top = self.is_top(side, price);
        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = map.get_mut(&price).expect("maker level must exist");
        level.update_quantities(old, new);

        let mutation = if snapshot.leaves_quantity == 0 {
            level.unlink(&mut self.arena, slot);
            let level_edge = level.is_empty();
            let info = Self::make_level_info(symbol_id, side, level);
            if level_edge {
                map.remove(&price);
            }
            self.ids.remove(&snapshot.id);
            self.arena.remove(slot);
            LevelMutation {
                slot,
                level_edge,
                info,
                top,
            }
        } else {
            let info = Self::make_level_info(symbol_id, side, level);
            LevelMutation {
                slot,
                level_edge: false,
                info,
                top,
            }
        };
        (snapshot, mutation)
    }

    /// Best parked buy stop: the lowest stop price.
    pub(crate) fn best_buy_stop(&self) -> Option<&PriceLevel> {
        self.buy_stops.first_key_value().map(|(_, l)| l)
    }

    /// Best parked sell stop: the highest stop price.
    pub(crate) fn best_sell_stop(&self) -> Option<&PriceLevel> {
        self.sell_stops.last_key_value().map(|(_, l)| l)
    }

    /// Best parked buy trailing stop: the lowest stop price.
    pub(crate) fn best_trailing_buy_stop(&self) -> Option<&PriceLevel> {
        self.trailing_buy_stops.first_key_value().map(|(_, l)| l)
    }

    /// Best parked sell trailing stop: the highest stop price.
    pub(crate) fn best_trailing_sell_stop(&self) -> Option<&PriceLevel> {
        self.trailing_sell_stops.last_key_value().map(|(_, l)| l)
    }

    /// Takes a serializable snapshot of the resting state.
    pub fn snapshot(&self) -> OrderBookSnapshot {
        let symbol_id = self.symbol.id;
        OrderBookSnapshot {
            symbol_id,
            bids: self
                .bid_levels()
                .map(|l| Self::make_level_info(symbol_id, Side::Buy, l))
                .collect(),
            asks: self
                .ask_levels()
                .map(|l| Self::make_level_info(symbol_id, Side::Sell, l))
                .collect(),
            last_trade_price: self.last_trade_price,
        }
    }
}
