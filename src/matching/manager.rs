//! The market manager: owner of all symbols, books and resting orders.
//!
//! Every public operation runs to completion on one serial context before
//! the next begins; all event callbacks into the sink happen on that same
//! context. Operations validate before mutating anything, so a returned
//! error leaves the engine untouched.

use crate::matching::book::{LevelMutation, OrderBook, OrderBookSnapshot};
use crate::matching::errors::ErrorCode;
use crate::matching::handler::MarketHandler;
use crate::matching::matcher::{
    book_update, execute_walk, initial_trailing_stop, market_limit, plan_fill,
    recalculated_trailing_stop, run_taker,
};
use crate::matching::order::{
    Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side,
};
use crate::matching::symbol::{Symbol, SymbolId, SymbolRegistry};
use std::collections::HashMap;
use tracing::{info, trace};

/// Multi-symbol market manager and matching engine front door.
pub struct MarketManager<H: MarketHandler> {
    handler: H,
    symbols: SymbolRegistry,
    books: HashMap<SymbolId, OrderBook>,
    /// Global order-id index: which book holds the order.
    order_index: HashMap<OrderId, SymbolId>,
    matching_enabled: bool,
}

fn emit_after_rest<H: MarketHandler>(book: &OrderBook, handler: &mut H, m: &LevelMutation) {
    if m.level_edge {
        handler.on_add_level(&m.info, m.top);
    } else {
        handler.on_update_level(&m.info, m.top);
    }
    handler.on_update_order_book(&book_update(book, m.top));
}

fn emit_after_remove<H: MarketHandler>(book: &OrderBook, handler: &mut H, m: &LevelMutation) {
    if m.level_edge {
        handler.on_delete_level(&m.info, m.top);
    } else {
        handler.on_update_level(&m.info, m.top);
    }
    handler.on_update_order_book(&book_update(book, m.top));
}

fn emit_after_update<H: MarketHandler>(book: &OrderBook, handler: &mut H, m: &LevelMutation) {
    handler.on_update_level(&m.info, m.top);
    handler.on_update_order_book(&book_update(book, m.top));
}

/// Rewrites a triggered stop-family order as its underlying market or limit
/// order.
fn convert_stop(order: &mut Order) {
    order.kind = match order.kind {
        OrderKind::Stop | OrderKind::TrailingStop => OrderKind::Market,
        OrderKind::StopLimit | OrderKind::TrailingStopLimit => OrderKind::Limit,
        kind => kind,
    };
    order.status = OrderStatus::New;
}

impl<H: MarketHandler> MarketManager<H> {
    /// Creates a manager that reports events to `handler`. Matching starts
    /// disabled, mirroring an exchange boot sequence.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            symbols: SymbolRegistry::new(),
            books: HashMap::new(),
            order_index: HashMap::new(),
            matching_enabled: false,
        }
    }

    /// Shared access to the event sink.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Exclusive access to the event sink (e.g. to flush a writer).
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the manager, returning the sink.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Looks up a symbol descriptor.
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Looks up an order book.
    pub fn order_book(&self, symbol_id: SymbolId) -> Option<&OrderBook> {
        self.books.get(&symbol_id)
    }

    /// Iterates over all order books in unspecified order.
    pub fn order_books(&self) -> impl Iterator<Item = &OrderBook> {
        self.books.values()
    }

    /// Looks up a resting or parked order by id.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        let symbol_id = self.order_index.get(&id)?;
        self.books.get(symbol_id)?.order(id)
    }

    /// Copies a read-only snapshot of a book under the engine's serial
    /// discipline.
    pub fn snapshot(&self, symbol_id: SymbolId) -> Result<OrderBookSnapshot, ErrorCode> {
        self.books
            .get(&symbol_id)
            .map(OrderBook::snapshot)
            .ok_or(ErrorCode::OrderBookNotFound)
    }

    /// True while the matching gate is open.
    pub fn is_matching_enabled(&self) -> bool {
        self.matching_enabled
    }

    /// Opens the matching gate and immediately matches every crossed book,
    /// then runs the stop activation scans.
    pub fn enable_matching(&mut self) {
        if self.matching_enabled {
            return;
        }
        self.matching_enabled = true;
        info!("matching enabled");
        let symbol_ids: Vec<SymbolId> = self.books.keys().copied().collect();
        for symbol_id in symbol_ids {
            self.match_crossed_book(symbol_id);
            self.activate_stops(symbol_id);
        }
    }

    /// Closes the matching gate; new orders rest without crossing until the
    /// gate reopens.
    pub fn disable_matching(&mut self) {
        if self.matching_enabled {
            self.matching_enabled = false;
            info!("matching disabled");
        }
    }

    /// Registers a symbol descriptor.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<(), ErrorCode> {
        self.symbols.insert(symbol)?;
        info!("add symbol: {}", symbol);
        self.handler.on_add_symbol(&symbol);
        Ok(())
    }

    /// Removes a symbol. Fails while an order book still references it.
    pub fn delete_symbol(&mut self, id: SymbolId) -> Result<(), ErrorCode> {
        if !self.symbols.contains(id) {
            return Err(ErrorCode::SymbolNotFound);
        }
        if self.books.contains_key(&id) {
            return Err(ErrorCode::SymbolHasBook);
        }
        let symbol = self.symbols.remove(id)?;
        info!("delete symbol: {}", symbol);
        self.handler.on_delete_symbol(&symbol);
        Ok(())
    }

    /// Creates the order book for a registered symbol.
    pub fn add_order_book(&mut self, symbol_id: SymbolId) -> Result<(), ErrorCode> {
        let symbol = *self.symbols.get(symbol_id).ok_or(ErrorCode::SymbolNotFound)?;
        if self.books.contains_key(&symbol_id) {
            return Err(ErrorCode::OrderBookDuplicate);
        }
        self.books.insert(symbol_id, OrderBook::new(symbol));
        info!("add order book: {}", symbol);
        self.handler.on_add_order_book(symbol_id);
        Ok(())
    }

    /// Removes an order book, cancelling every resting and parked order.
    pub fn delete_order_book(&mut self, symbol_id: SymbolId) -> Result<(), ErrorCode> {
        let mut book = self
            .books
            .remove(&symbol_id)
            .ok_or(ErrorCode::OrderBookNotFound)?;
        for (_, order) in book.arena.iter_mut() {
            order.status = OrderStatus::Cancelled;
            self.order_index.remove(&order.id);
            self.handler.on_delete_order(order);
        }
        info!("delete order book: {}", book.symbol());
        self.handler.on_delete_order_book(symbol_id);
        Ok(())
    }

    /// Accepts a new order and routes it through the matching kernel.
    ///
    /// While matching is disabled the order is accepted and parked without
    /// crossing (market orders, which cannot rest, are cancelled).
    pub fn add_order(&mut self, order: Order) -> Result<(), ErrorCode> {
        order.validate()?;
        if self.order_index.contains_key(&order.id) {
            return Err(ErrorCode::OrderDuplicate);
        }
        if !self.books.contains_key(&order.symbol_id) {
            return Err(ErrorCode::OrderBookNotFound);
        }

        let mut order = order;
        order.executed_quantity = 0;
        order.leaves_quantity = order.quantity;
        order.status = OrderStatus::New;
        order.seq = 0;
        order.prev = None;
        order.next = None;

        trace!("add order: {}", order);
        self.handler.on_add_order(&order);

        let symbol_id = order.symbol_id;
        match order.kind {
            OrderKind::Market => self.submit_market(order),
            OrderKind::Limit => self.submit_limit(order),
            _ => self.submit_stop(order),
        }
        self.activate_stops(symbol_id);
        Ok(())
    }

    /// Decreases an order's open quantity by `quantity`; the order is
    /// removed once nothing is left.
    pub fn reduce_order(&mut self, id: OrderId, quantity: Quantity) -> Result<(), ErrorCode> {
        if id == 0 {
            return Err(ErrorCode::OrderIdInvalid);
        }
        if quantity == 0 {
            return Err(ErrorCode::OrderParametersInvalid);
        }
        let (symbol_id, slot) = self.locate(id)?;
        let book = self.books.get_mut(&symbol_id).ok_or(ErrorCode::OrderNotFound)?;
        let leaves = book.arena[slot].leaves_quantity;
        let delta = quantity.min(leaves);

        if delta == leaves {
            let (mut order, m) = book.unrest(slot);
            let resting = order_was_resting(&order);
            order.status = OrderStatus::Cancelled;
            if resting {
                emit_after_remove(book, &mut self.handler, &m);
            }
            self.order_index.remove(&id);
            trace!("reduce order {} to zero, cancelled", id);
            self.handler.on_delete_order(&order);
        } else {
            let m = book.reduce_in_place(slot, delta);
            let order = book.arena[slot];
            self.handler.on_update_order(&order);
            if order_was_resting(&order) {
                emit_after_update(book, &mut self.handler, &m);
            }
        }
        Ok(())
    }

    /// Replaces an order's price and quantity; price-time priority is lost.
    pub fn modify_order(
        &mut self,
        id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> Result<(), ErrorCode> {
        self.modify_internal(id, new_price, new_quantity, false)
    }

    /// Replaces an order's price and quantity, keeping priority when the
    /// price is unchanged and the quantity does not grow.
    pub fn mitigate_order(
        &mut self,
        id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> Result<(), ErrorCode> {
        self.modify_internal(id, new_price, new_quantity, true)
    }

    /// Atomically deletes `id` and adds the same order back under `new_id`
    /// with a new price and quantity.
    pub fn replace_order(
        &mut self,
        id: OrderId,
        new_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> Result<(), ErrorCode> {
        if new_id == 0 {
            return Err(ErrorCode::OrderIdInvalid);
        }
        if new_quantity == 0 {
            return Err(ErrorCode::OrderParametersInvalid);
        }
        if new_id != id && self.order_index.contains_key(&new_id) {
            return Err(ErrorCode::OrderDuplicate);
        }
        let (symbol_id, slot) = self.locate(id)?;
        {
            let book = &self.books[&symbol_id];
            let order = &book.arena[slot];
            if !order.kind.converts_to_market() && new_price == 0 {
                return Err(ErrorCode::OrderParametersInvalid);
            }
        }

        let book = self.books.get_mut(&symbol_id).ok_or(ErrorCode::OrderNotFound)?;
        let (mut old, m) = book.unrest(slot);
        let resting = order_was_resting(&old);
        old.status = OrderStatus::Replaced;
        if resting {
            emit_after_remove(book, &mut self.handler, &m);
        }
        self.order_index.remove(&id);
        self.handler.on_delete_order(&old);

        // The replacement keeps the kind, side, policy and trigger
        // parameters of the original under the fresh id and terms.
        let mut order = old;
        order.id = new_id;
        order.price = new_price;
        order.quantity = new_quantity;
        order.executed_quantity = 0;
        order.leaves_quantity = new_quantity;
        order.status = OrderStatus::New;
        order.seq = 0;

        trace!("replace order {} -> {}", id, new_id);
        self.handler.on_add_order(&order);
        match order.kind {
            OrderKind::Market => self.submit_market(order),
            OrderKind::Limit => self.submit_limit(order),
            _ => self.submit_stop(order),
        }
        self.activate_stops(symbol_id);
        Ok(())
    }

    /// Cancels an order.
    pub fn delete_order(&mut self, id: OrderId) -> Result<(), ErrorCode> {
        let (symbol_id, slot) = self.locate(id)?;
        let book = self.books.get_mut(&symbol_id).ok_or(ErrorCode::OrderNotFound)?;
        let (mut order, m) = book.unrest(slot);
        let resting = order_was_resting(&order);
        order.status = OrderStatus::Cancelled;
        if resting {
            emit_after_remove(book, &mut self.handler, &m);
        }
        self.order_index.remove(&id);
        trace!("delete order: {}", order);
        self.handler.on_delete_order(&order);
        self.activate_stops(symbol_id);
        Ok(())
    }

    fn locate(&self, id: OrderId) -> Result<(SymbolId, usize), ErrorCode> {
        let symbol_id = *self.order_index.get(&id).ok_or(ErrorCode::OrderNotFound)?;
        let slot = *self
            .books
            .get(&symbol_id)
            .and_then(|b| b.ids.get(&id))
            .ok_or(ErrorCode::OrderNotFound)?;
        Ok((symbol_id, slot))
    }

    fn modify_internal(
        &mut self,
        id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        mitigate: bool,
    ) -> Result<(), ErrorCode> {
        if id == 0 {
            return Err(ErrorCode::OrderIdInvalid);
        }
        if new_quantity == 0 {
            return Err(ErrorCode::OrderParametersInvalid);
        }
        let (symbol_id, slot) = self.locate(id)?;
        {
            let order = &self.books[&symbol_id].arena[slot];
            if !order.kind.converts_to_market() && new_price == 0 {
                return Err(ErrorCode::OrderParametersInvalid);
            }
        }

        let book = self.books.get_mut(&symbol_id).ok_or(ErrorCode::OrderNotFound)?;
        let current = book.arena[slot];

        // In-flight mitigation: shrink in place, keeping queue position.
        if mitigate && new_price == current.price && new_quantity <= current.quantity {
            let new_leaves = new_quantity.saturating_sub(current.executed_quantity);
            if new_leaves == 0 {
                let (mut order, m) = book.unrest(slot);
                let resting = order_was_resting(&order);
                order.quantity = new_quantity;
                order.leaves_quantity = 0;
                order.status = if order.executed_quantity > 0 {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Cancelled
                };
                if resting {
                    emit_after_remove(book, &mut self.handler, &m);
                }
                self.order_index.remove(&id);
                self.handler.on_delete_order(&order);
            } else {
                let delta = current.quantity - new_quantity;
                let m = book.reduce_in_place(slot, delta);
                let order = book.arena[slot];
                self.handler.on_update_order(&order);
                if order_was_resting(&order) {
                    emit_after_update(book, &mut self.handler, &m);
                }
            }
            return Ok(());
        }

        // Full modification: leave the queue, take the new terms, re-match.
        let (mut order, m) = book.unrest(slot);
        if order_was_resting(&order) {
            emit_after_remove(book, &mut self.handler, &m);
        }
        self.order_index.remove(&id);

        order.price = new_price;
        order.quantity = new_quantity;
        order.leaves_quantity = new_quantity.saturating_sub(order.executed_quantity);
        order.seq = 0;
        if order.leaves_quantity == 0 {
            order.status = OrderStatus::Filled;
            self.handler.on_delete_order(&order);
            return Ok(());
        }

        trace!("modify order {}: price={} qty={}", id, new_price, new_quantity);
        self.handler.on_update_order(&order);
        if order.status == OrderStatus::Pending {
            // Parked stop orders re-park under their (unchanged) trigger.
            let book = self.books.get_mut(&symbol_id).ok_or(ErrorCode::OrderNotFound)?;
            book.park_stop(order);
            self.order_index.insert(order.id, symbol_id);
        } else {
            order.status = if order.executed_quantity > 0 {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            };
            self.submit_limit(order);
        }
        self.activate_stops(symbol_id);
        Ok(())
    }

    fn submit_market(&mut self, mut order: Order) {
        let Some(book) = self.books.get_mut(&order.symbol_id) else {
            return;
        };
        if self.matching_enabled {
            if let Some(limit) = market_limit(book, &order) {
                // The effective limit travels in the price field, exactly as
                // a slippage-capped limit order would.
                order.price = limit;
                let outcome = run_taker(book, &mut self.handler, &mut order);
                for removed in &outcome.removed_ids {
                    self.order_index.remove(removed);
                }
            }
        }
        if order.leaves_quantity > 0 {
            order.status = OrderStatus::Cancelled;
        }
        self.handler.on_delete_order(&order);
    }

    fn submit_limit(&mut self, mut order: Order) {
        let Some(book) = self.books.get_mut(&order.symbol_id) else {
            return;
        };
        if self.matching_enabled {
            let outcome = run_taker(book, &mut self.handler, &mut order);
            for removed in &outcome.removed_ids {
                self.order_index.remove(removed);
            }
        }
        if order.leaves_quantity > 0 && !order.time_in_force.is_immediate() {
            let m = book.rest_order(order);
            emit_after_rest(book, &mut self.handler, &m);
            self.order_index.insert(order.id, order.symbol_id);
        } else {
            if order.leaves_quantity > 0 {
                order.status = OrderStatus::Cancelled;
            }
            self.handler.on_delete_order(&order);
        }
    }

    fn submit_stop(&mut self, mut order: Order) {
        let Some(book) = self.books.get_mut(&order.symbol_id) else {
            return;
        };
        if order.kind.is_trailing() {
            if let Some(reference) = book.trailing_reference(order.side) {
                order.stop_price = initial_trailing_stop(&order, reference);
            } else if order.stop_price == 0 && order.side == Side::Buy {
                // No reference yet: park inert until the first recompute
                // supplies a real trigger.
                order.stop_price = Price::MAX;
            }
        }
        let triggered = self.matching_enabled
            && match order.side {
                Side::Buy => book
                    .stop_reference_ask()
                    .is_some_and(|r| r >= order.stop_price),
                Side::Sell => book
                    .stop_reference_bid()
                    .is_some_and(|r| r <= order.stop_price),
            };
        if triggered {
            convert_stop(&mut order);
            self.handler.on_update_order(&order);
            match order.kind {
                OrderKind::Market => self.submit_market(order),
                _ => self.submit_limit(order),
            }
        } else {
            book.park_stop(order);
            self.order_index.insert(order.id, order.symbol_id);
        }
    }

    /// Matches a book left crossed while the gate was shut. The newer front
    /// order replays through the kernel so the older order's price wins.
    fn match_crossed_book(&mut self, symbol_id: SymbolId) {
        loop {
            let Some(book) = self.books.get_mut(&symbol_id) else {
                return;
            };
            let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
                break;
            };
            if bid.price() < ask.price() {
                break;
            }
            let (Some(bid_slot), Some(ask_slot)) = (bid.front(), ask.front()) else {
                break;
            };
            let taker_slot = if book.arena[bid_slot].seq > book.arena[ask_slot].seq {
                bid_slot
            } else {
                ask_slot
            };

            let (mut taker, m) = book.unrest(taker_slot);
            emit_after_remove(book, &mut self.handler, &m);
            // An all-or-none front that cannot fill in full stays put; stop
            // to avoid spinning on the same pair.
            if taker.is_aon() && plan_fill(book, &taker, taker.price) < taker.leaves_quantity {
                let m = book.rest_order(taker);
                emit_after_rest(book, &mut self.handler, &m);
                break;
            }
            let outcome = execute_walk(book, &mut self.handler, &mut taker);
            for removed in &outcome.removed_ids {
                self.order_index.remove(removed);
            }
            if taker.leaves_quantity > 0 {
                let m = book.rest_order(taker);
                emit_after_rest(book, &mut self.handler, &m);
            } else {
                self.order_index.remove(&taker.id);
                self.handler.on_delete_order(&taker);
            }
            if outcome.executed == 0 {
                break;
            }
        }
    }

    /// Activation scan: recompute trailing triggers, then convert every stop
    /// whose reference price has crossed it. Loops until a full pass
    /// activates nothing, since activated orders can trade and move the
    /// reference again.
    fn activate_stops(&mut self, symbol_id: SymbolId) {
        if !self.matching_enabled {
            return;
        }
        loop {
            self.recalculate_trailing(symbol_id, Side::Buy);
            let activated_buys = self.activate_stop_side(symbol_id, Side::Buy);
            self.recalculate_trailing(symbol_id, Side::Sell);
            let activated_sells = self.activate_stop_side(symbol_id, Side::Sell);
            if !activated_buys && !activated_sells {
                break;
            }
        }
    }

    fn activate_stop_side(&mut self, symbol_id: SymbolId, side: Side) -> bool {
        let mut activated = false;
        loop {
            let Some(book) = self.books.get_mut(&symbol_id) else {
                return activated;
            };
            let slot = {
                // Best candidate across the plain and trailing side-books.
                let (reference, plain, trailing) = match side {
                    Side::Buy => (
                        book.stop_reference_ask(),
                        book.best_buy_stop(),
                        book.best_trailing_buy_stop(),
                    ),
                    Side::Sell => (
                        book.stop_reference_bid(),
                        book.best_sell_stop(),
                        book.best_trailing_sell_stop(),
                    ),
                };
                let level = match (plain, trailing) {
                    (Some(a), Some(b)) => {
                        let a_first = match side {
                            Side::Buy => a.price() <= b.price(),
                            Side::Sell => a.price() >= b.price(),
                        };
                        Some(if a_first { a } else { b })
                    }
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                };
                let (Some(reference), Some(level)) = (reference, level) else {
                    break;
                };
                let triggered = match side {
                    Side::Buy => reference >= level.price(),
                    Side::Sell => reference <= level.price(),
                };
                if !triggered {
                    break;
                }
                level.front()
            };
            let Some(slot) = slot else {
                break;
            };

            let (mut order, _) = book.unrest(slot);
            self.order_index.remove(&order.id);
            convert_stop(&mut order);
            trace!("stop activated: {}", order);
            self.handler.on_update_order(&order);
            match order.kind {
                OrderKind::Market => self.submit_market(order),
                _ => self.submit_limit(order),
            }
            activated = true;
        }
        activated
    }

    /// Recomputes trailing stop prices against the current best opposite
    /// price. Runs only when the top has actually moved since the previous
    /// recompute.
    fn recalculate_trailing(&mut self, symbol_id: SymbolId, side: Side) {
        let Some(book) = self.books.get_mut(&symbol_id) else {
            return;
        };
        let Some(reference) = book.trailing_reference(side) else {
            return;
        };
        let anchor = match side {
            Side::Buy => &mut book.trailing_ask_anchor,
            Side::Sell => &mut book.trailing_bid_anchor,
        };
        if *anchor == Some(reference) {
            return;
        }
        *anchor = Some(reference);

        let map = match side {
            Side::Buy => &book.trailing_buy_stops,
            Side::Sell => &book.trailing_sell_stops,
        };
        let slots: Vec<usize> = map
            .values()
            .flat_map(|level| level.iter(&book.arena).map(|(slot, _)| slot))
            .collect();

        for slot in slots {
            let current = book.arena[slot];
            let new_stop = recalculated_trailing_stop(&current, reference);
            if new_stop == current.stop_price {
                continue;
            }
            let (mut order, _) = book.unrest(slot);
            if order.kind == OrderKind::TrailingStopLimit {
                // The limit price keeps its distance to the trigger.
                if new_stop >= order.stop_price {
                    order.price = order.price.saturating_add(new_stop - order.stop_price);
                } else {
                    order.price = order
                        .price
                        .saturating_sub(order.stop_price - new_stop)
                        .max(1);
                }
            }
            order.stop_price = new_stop;
            trace!("trailing stop moved: {}", order);
            self.handler.on_update_order(&order);
            book.park_stop(order);
        }
    }
}

/// True when the order occupied a market-book level (and so its removal or
/// change carries level events); parked stop orders do not.
fn order_was_resting(order: &Order) -> bool {
    order.status != OrderStatus::Pending
}
