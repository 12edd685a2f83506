//! Reference event sink: risk pipeline plus batched store writer.
//!
//! [`MarketRecorder`] consumes the engine's event stream, keeps positions
//! current through a [`RiskEngine`], and turns events into store rows via a
//! [`BatchWriter`]. It runs inside the matching critical section, so all it
//! does per event is in-memory bookkeeping and chunk buffering; the store
//! client (possibly a background [`StoreWorker`](crate::store::StoreWorker))
//! takes it from there.

use crate::matching::handler::{BookUpdate, MarketHandler};
use crate::matching::order::{Order, Price, Quantity};
use crate::matching::symbol::{Symbol, SymbolId};
use crate::risk::engine::{mark_price, RiskEngine};
use crate::risk::position::Position;
use crate::store::client::StoreClient;
use crate::store::rows::{OrderRow, PositionRow, PriceRow, SymbolRow};
use crate::store::writer::BatchWriter;
use crate::utils::current_time_millis;
use std::collections::HashMap;

/// Default number of book-change events between mark-price updates.
pub const DEFAULT_CLOCK_INTERVAL: u64 = 10_000;

/// Event sink that maintains positions and feeds the external store.
pub struct MarketRecorder<S: StoreClient> {
    symbols: HashMap<SymbolId, Symbol>,
    risk: RiskEngine,
    writer: BatchWriter<S>,
    /// Mark-price work runs every `clock_interval` book-change events.
    clock_interval: u64,
    book_changes: u64,
    /// Exogenous index prices; absent symbols fall back to the mark price
    /// (zero funding rate).
    index_prices: HashMap<SymbolId, Price>,
}

impl<S: StoreClient> MarketRecorder<S> {
    /// Creates a recorder with the default chunking and mark throttle.
    pub fn new(store: S) -> Self {
        Self::with_settings(
            store,
            crate::store::writer::DEFAULT_CHUNK_SIZE,
            DEFAULT_CLOCK_INTERVAL,
        )
    }

    /// Creates a recorder with explicit chunk size and mark-price throttle.
    /// A `clock_interval` of 0 is treated as 1 (update on every change).
    pub fn with_settings(store: S, chunk_size: usize, clock_interval: u64) -> Self {
        Self {
            symbols: HashMap::new(),
            risk: RiskEngine::new(),
            writer: BatchWriter::with_chunk_size(store, chunk_size),
            clock_interval: clock_interval.max(1),
            book_changes: 0,
            index_prices: HashMap::new(),
        }
    }

    /// Replaces the risk engine, e.g. one seeded with a position-id floor
    /// read from the store.
    pub fn with_risk_engine(mut self, risk: RiskEngine) -> Self {
        self.risk = risk;
        self
    }

    /// Supplies the exogenous index price for a symbol.
    pub fn set_index_price(&mut self, symbol_id: SymbolId, index_price: Price) {
        self.index_prices.insert(symbol_id, index_price);
    }

    /// Pre-creates flat positions for an account across every known symbol
    /// and upserts them to the store.
    pub fn open_account(&mut self, account_id: u64) {
        let now = current_time_millis();
        let symbols: Vec<Symbol> = self.symbols.values().copied().collect();
        let created = self.risk.open_account(account_id, symbols.iter());
        for position in &created {
            self.writer
                .push_position(PositionRow::from_position(position, now));
        }
        self.writer.flush();
    }

    /// The position book.
    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Current position for an account and symbol.
    pub fn position(&self, account_id: u64, symbol_id: SymbolId) -> Option<&Position> {
        self.risk.position(account_id, symbol_id)
    }

    /// Drains every buffered chunk to the store.
    pub fn flush(&mut self) {
        self.writer.flush();
    }

    /// Consumes the recorder, draining chunks and returning the client.
    pub fn into_store(self) -> S {
        self.writer.into_store()
    }

    fn mark_price_update(&mut self, update: &BookUpdate) {
        self.book_changes += 1;
        if self.book_changes < self.clock_interval {
            return;
        }
        self.book_changes = 0;

        let Some(mark) = mark_price(update.best_bid, update.best_ask) else {
            return;
        };
        let Some(symbol) = self.symbols.get(&update.symbol_id).copied() else {
            return;
        };
        let index = self
            .index_prices
            .get(&update.symbol_id)
            .copied()
            .unwrap_or(mark);
        let now = current_time_millis();
        let (risk_z, risk_c) = self.risk.mark_price_tick(&symbol, mark, index, now);
        self.writer.insert_price(PriceRow {
            time: now,
            symbol_id: symbol.id,
            mark_price: mark,
            index_price: index,
            best_bid: update.best_bid.unwrap_or(0),
            best_ask: update.best_ask.unwrap_or(0),
            risk_z,
            risk_c,
        });
    }
}

impl<S: StoreClient> MarketHandler for MarketRecorder<S> {
    fn on_add_symbol(&mut self, symbol: &Symbol) {
        self.symbols.insert(symbol.id, *symbol);
        self.writer
            .insert_symbol(SymbolRow::from_symbol(symbol, current_time_millis()));
    }

    fn on_delete_symbol(&mut self, symbol: &Symbol) {
        self.symbols.remove(&symbol.id);
    }

    fn on_update_order_book(&mut self, update: &BookUpdate) {
        self.mark_price_update(update);
    }

    fn on_add_order(&mut self, order: &Order) {
        self.writer
            .push_order(OrderRow::from_order(order, current_time_millis()));
    }

    fn on_update_order(&mut self, order: &Order) {
        // Full-row upsert reading of an order update.
        self.writer
            .push_order(OrderRow::from_order(order, current_time_millis()));
    }

    fn on_delete_order(&mut self, order: &Order) {
        // Terminal state row, so the log shows how the order ended.
        self.writer
            .push_order(OrderRow::from_order(order, current_time_millis()));
    }

    fn on_execute_order(&mut self, order: &Order, price: Price, quantity: Quantity) {
        let now = current_time_millis();
        self.writer
            .push_transaction(OrderRow::from_execution(order, price, quantity, now));
        if let Some(symbol) = self.symbols.get(&order.symbol_id).copied() {
            let position = self.risk.order_executed(&symbol, order, price, quantity);
            self.writer
                .push_position(PositionRow::from_position(position, now));
        }
    }
}
