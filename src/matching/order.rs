//! Order model: sides, order kinds, time-in-force policies and the order
//! record itself.
//!
//! Prices and quantities are unsigned 64-bit fixed-point integers in units
//! agreed per symbol; the matching path never converts them to floating
//! point.

use crate::matching::errors::ErrorCode;
use crate::matching::symbol::SymbolId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order identifier, unique process-wide. Id 0 is reserved.
pub type OrderId = u64;

/// Account identifier.
pub type AccountId = u64;

/// Fixed-point price in symbol units.
pub type Price = u64;

/// Fixed-point quantity in symbol units.
pub type Quantity = u64;

/// Slippage value meaning "no bound" for market orders.
pub const UNLIMITED_SLIPPAGE: Price = Price::MAX;

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bids).
    #[serde(alias = "buy", alias = "BUY")]
    Buy,
    /// Sell side (asks).
    #[serde(alias = "sell", alias = "SELL")]
    Sell,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(ErrorCode::OrderParametersInvalid),
        }
    }
}

/// Kind of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Execute immediately at the best available prices, optionally bounded
    /// by a slippage cap. Never rests.
    Market,
    /// Execute at `price` or better; the remainder may rest.
    Limit,
    /// Parked until the market reference crosses `stop_price`, then converts
    /// to a market order.
    Stop,
    /// Parked until triggered, then converts to a limit order at `price`.
    StopLimit,
    /// A stop whose trigger trails the best opposite price.
    TrailingStop,
    /// A stop-limit whose trigger and limit price trail the best opposite
    /// price.
    TrailingStopLimit,
}

impl OrderKind {
    /// True for the stop family (including trailing variants).
    pub fn is_stop_family(self) -> bool {
        matches!(
            self,
            OrderKind::Stop
                | OrderKind::StopLimit
                | OrderKind::TrailingStop
                | OrderKind::TrailingStopLimit
        )
    }

    /// True for the trailing variants.
    pub fn is_trailing(self) -> bool {
        matches!(self, OrderKind::TrailingStop | OrderKind::TrailingStopLimit)
    }

    /// True for kinds that convert to a market order on activation (or are
    /// one already).
    pub fn converts_to_market(self) -> bool {
        matches!(
            self,
            OrderKind::Market | OrderKind::Stop | OrderKind::TrailingStop
        )
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP-LIMIT"),
            OrderKind::TrailingStop => write!(f, "TRAILING-STOP"),
            OrderKind::TrailingStopLimit => write!(f, "TRAILING-STOP-LIMIT"),
        }
    }
}

/// Time-in-force policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good 'til cancelled: the remainder rests.
    #[serde(alias = "gtc", alias = "GTC")]
    Gtc,
    /// Immediate or cancel: any remainder is cancelled, never rests.
    #[serde(alias = "ioc", alias = "IOC")]
    Ioc,
    /// Fill or kill: full immediate fill or full cancel, no partial fills.
    #[serde(alias = "fok", alias = "FOK")]
    Fok,
    /// All or none: rests until a single counter-event can fill the whole
    /// leaves quantity.
    #[serde(alias = "aon", alias = "AON")]
    Aon,
}

impl TimeInForce {
    /// True when any unfilled remainder must be cancelled instead of rested.
    pub fn is_immediate(self) -> bool {
        matches!(self, TimeInForce::Ioc | TimeInForce::Fok)
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
            TimeInForce::Aon => write!(f, "AON"),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            "AON" => Ok(TimeInForce::Aon),
            _ => Err(ErrorCode::OrderTifInvalid),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, no executions yet.
    New,
    /// Parked in a stop or trailing side-book, waiting for activation.
    Pending,
    /// Partially executed, leaves remaining.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Cancelled before completion (explicitly or by policy).
    Cancelled,
    /// Removed by a replace operation.
    Replaced,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY-FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Replaced => write!(f, "REPLACED"),
        }
    }
}

/// An order record.
///
/// Plain `Copy` data: the book's arena owns the resting instance and every
/// event callback receives a value snapshot. The invariant
/// `leaves_quantity + executed_quantity == quantity` holds at all times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id, unique process-wide.
    pub id: OrderId,
    /// Symbol this order trades.
    pub symbol_id: SymbolId,
    /// Owning account, carried through to the risk pipeline.
    pub account_id: AccountId,
    /// Buy or sell.
    pub side: Side,
    /// Order kind.
    pub kind: OrderKind,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Limit price; 0 for pure market/stop orders.
    pub price: Price,
    /// Stop trigger price for the stop family.
    pub stop_price: Price,
    /// Total quantity.
    pub quantity: Quantity,
    /// Quantity executed so far.
    pub executed_quantity: Quantity,
    /// Quantity still open.
    pub leaves_quantity: Quantity,
    /// Iceberg cap on the visible portion; 0 means fully visible.
    pub max_visible_quantity: Quantity,
    /// Worst acceptable deviation from the first touched level for market
    /// executions, in absolute ticks. [`UNLIMITED_SLIPPAGE`] disables the cap.
    pub slippage: Price,
    /// Trailing offset. Positive values are absolute ticks; negative values
    /// are percentages in 0.01% units.
    pub trailing_distance: i64,
    /// Minimum move before the trailing stop is adjusted; same units as
    /// `trailing_distance`.
    pub trailing_step: i64,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Book-assigned insertion sequence, the price-time tie-break.
    #[serde(skip)]
    pub(crate) seq: u64,
    /// Intrusive level-queue link to the previous order's arena slot.
    #[serde(skip)]
    pub(crate) prev: Option<usize>,
    /// Intrusive level-queue link to the next order's arena slot.
    #[serde(skip)]
    pub(crate) next: Option<usize>,
}

impl Order {
    fn base(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        kind: OrderKind,
        time_in_force: TimeInForce,
        price: Price,
        stop_price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id,
            symbol_id,
            account_id: 0,
            side,
            kind,
            time_in_force,
            price,
            stop_price,
            quantity,
            executed_quantity: 0,
            leaves_quantity: quantity,
            max_visible_quantity: 0,
            slippage: UNLIMITED_SLIPPAGE,
            trailing_distance: 0,
            trailing_step: 0,
            status: OrderStatus::New,
            seq: 0,
            prev: None,
            next: None,
        }
    }

    /// Creates a limit order.
    pub fn limit(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self::base(
            id,
            symbol_id,
            side,
            OrderKind::Limit,
            TimeInForce::Gtc,
            price,
            0,
            quantity,
        )
    }

    /// Creates a buy limit order (GTC).
    pub fn buy_limit(id: OrderId, symbol_id: SymbolId, price: Price, quantity: Quantity) -> Self {
        Self::limit(id, symbol_id, Side::Buy, price, quantity)
    }

    /// Creates a sell limit order (GTC).
    pub fn sell_limit(id: OrderId, symbol_id: SymbolId, price: Price, quantity: Quantity) -> Self {
        Self::limit(id, symbol_id, Side::Sell, price, quantity)
    }

    /// Creates a market order (IOC).
    pub fn market(id: OrderId, symbol_id: SymbolId, side: Side, quantity: Quantity) -> Self {
        Self::base(
            id,
            symbol_id,
            side,
            OrderKind::Market,
            TimeInForce::Ioc,
            0,
            0,
            quantity,
        )
    }

    /// Creates a buy market order (IOC).
    pub fn buy_market(id: OrderId, symbol_id: SymbolId, quantity: Quantity) -> Self {
        Self::market(id, symbol_id, Side::Buy, quantity)
    }

    /// Creates a sell market order (IOC).
    pub fn sell_market(id: OrderId, symbol_id: SymbolId, quantity: Quantity) -> Self {
        Self::market(id, symbol_id, Side::Sell, quantity)
    }

    /// Creates a stop order that converts to market on activation (IOC).
    pub fn stop(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        stop_price: Price,
        quantity: Quantity,
    ) -> Self {
        Self::base(
            id,
            symbol_id,
            side,
            OrderKind::Stop,
            TimeInForce::Ioc,
            0,
            stop_price,
            quantity,
        )
    }

    /// Creates a stop-limit order that converts to a limit at `price` on
    /// activation (GTC).
    pub fn stop_limit(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        stop_price: Price,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self::base(
            id,
            symbol_id,
            side,
            OrderKind::StopLimit,
            TimeInForce::Gtc,
            price,
            stop_price,
            quantity,
        )
    }

    /// Creates a trailing stop order (IOC). The stop price is recomputed from
    /// the best opposite price when the order enters the book.
    pub fn trailing_stop(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        quantity: Quantity,
        trailing_distance: i64,
        trailing_step: i64,
    ) -> Self {
        let mut order = Self::base(
            id,
            symbol_id,
            side,
            OrderKind::TrailingStop,
            TimeInForce::Ioc,
            0,
            0,
            quantity,
        );
        order.trailing_distance = trailing_distance;
        order.trailing_step = trailing_step;
        order
    }

    /// Creates a trailing stop-limit order (GTC). The gap between `price`
    /// and `stop_price` is preserved as the trigger trails the market.
    #[allow(clippy::too_many_arguments)]
    pub fn trailing_stop_limit(
        id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        stop_price: Price,
        price: Price,
        quantity: Quantity,
        trailing_distance: i64,
        trailing_step: i64,
    ) -> Self {
        let mut order = Self::base(
            id,
            symbol_id,
            side,
            OrderKind::TrailingStopLimit,
            TimeInForce::Gtc,
            price,
            stop_price,
            quantity,
        );
        order.trailing_distance = trailing_distance;
        order.trailing_step = trailing_step;
        order
    }

    /// Sets the time-in-force policy.
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Sets the owning account.
    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = account_id;
        self
    }

    /// Caps the visible portion (iceberg).
    pub fn with_max_visible(mut self, max_visible_quantity: Quantity) -> Self {
        self.max_visible_quantity = max_visible_quantity;
        self
    }

    /// Bounds market executions relative to the first touched level.
    pub fn with_slippage(mut self, slippage: Price) -> Self {
        self.slippage = slippage;
        self
    }

    /// True for buy orders.
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    /// True for all-or-none orders.
    pub fn is_aon(&self) -> bool {
        self.time_in_force == TimeInForce::Aon
    }

    /// True for fill-or-kill orders.
    pub fn is_fok(&self) -> bool {
        self.time_in_force == TimeInForce::Fok
    }

    /// True for immediate-or-cancel orders.
    pub fn is_ioc(&self) -> bool {
        self.time_in_force == TimeInForce::Ioc
    }

    /// True when only part of the order is shown to matching.
    pub fn is_iceberg(&self) -> bool {
        self.max_visible_quantity > 0 && self.max_visible_quantity < self.quantity
    }

    /// The matchable (displayed) portion of the open quantity.
    pub fn visible_quantity(&self) -> Quantity {
        if self.max_visible_quantity > 0 {
            self.leaves_quantity.min(self.max_visible_quantity)
        } else {
            self.leaves_quantity
        }
    }

    /// The reserve portion of the open quantity.
    pub fn hidden_quantity(&self) -> Quantity {
        self.leaves_quantity - self.visible_quantity()
    }

    /// Applies an execution of `quantity` units to this order's counters.
    pub(crate) fn fill(&mut self, quantity: Quantity) {
        debug_assert!(quantity <= self.leaves_quantity);
        self.executed_quantity += quantity;
        self.leaves_quantity -= quantity;
        self.status = if self.leaves_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Validates the order parameters per the engine's acceptance rules.
    pub fn validate(&self) -> Result<(), ErrorCode> {
        if self.id == 0 {
            return Err(ErrorCode::OrderIdInvalid);
        }
        if self.quantity == 0 {
            return Err(ErrorCode::OrderParametersInvalid);
        }
        if self.max_visible_quantity > self.quantity {
            return Err(ErrorCode::OrderParametersInvalid);
        }
        match self.kind {
            OrderKind::Market | OrderKind::Stop | OrderKind::TrailingStop => {
                // Market-converting kinds cannot rest, so only immediate
                // policies are meaningful; AON in particular is rejected.
                if self.time_in_force == TimeInForce::Aon {
                    return Err(ErrorCode::OrderTypeInvalid);
                }
                if !self.time_in_force.is_immediate() {
                    return Err(ErrorCode::OrderTifInvalid);
                }
            }
            OrderKind::Limit | OrderKind::StopLimit | OrderKind::TrailingStopLimit => {
                if self.price == 0 {
                    return Err(ErrorCode::OrderParametersInvalid);
                }
            }
        }
        match self.kind {
            OrderKind::Stop | OrderKind::StopLimit => {
                if self.stop_price == 0 {
                    return Err(ErrorCode::OrderParametersInvalid);
                }
            }
            OrderKind::TrailingStop | OrderKind::TrailingStopLimit => {
                if self.trailing_distance == 0 {
                    return Err(ErrorCode::OrderParametersInvalid);
                }
                // Distance and step share a unit: both absolute ticks
                // (positive) or both percentages in 0.01% units (negative).
                if (self.trailing_distance > 0 && self.trailing_step < 0)
                    || (self.trailing_distance < 0 && self.trailing_step > 0)
                {
                    return Err(ErrorCode::OrderParametersInvalid);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order(id={}; symbol={}; {} {} {}; price={}; qty={}/{})",
            self.id,
            self.symbol_id,
            self.side,
            self.kind,
            self.time_in_force,
            self.price,
            self.executed_quantity,
            self.quantity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_set_sensible_defaults() {
        let o = Order::buy_limit(1, 1, 100, 10);
        assert_eq!(o.kind, OrderKind::Limit);
        assert_eq!(o.time_in_force, TimeInForce::Gtc);
        assert_eq!(o.leaves_quantity, 10);
        assert_eq!(o.slippage, UNLIMITED_SLIPPAGE);
        assert!(o.validate().is_ok());

        let m = Order::sell_market(2, 1, 5);
        assert_eq!(m.kind, OrderKind::Market);
        assert_eq!(m.time_in_force, TimeInForce::Ioc);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        assert_eq!(
            Order::buy_limit(0, 1, 100, 10).validate(),
            Err(ErrorCode::OrderIdInvalid)
        );
        assert_eq!(
            Order::buy_limit(1, 1, 100, 0).validate(),
            Err(ErrorCode::OrderParametersInvalid)
        );
        assert_eq!(
            Order::buy_limit(1, 1, 0, 10).validate(),
            Err(ErrorCode::OrderParametersInvalid)
        );
        assert_eq!(
            Order::stop(1, 1, Side::Buy, 0, 10).validate(),
            Err(ErrorCode::OrderParametersInvalid)
        );
        assert_eq!(
            Order::buy_limit(1, 1, 100, 10).with_max_visible(11).validate(),
            Err(ErrorCode::OrderParametersInvalid)
        );
    }

    #[test]
    fn test_validation_rejects_bad_type_and_tif_combinations() {
        let aon_market = Order::buy_market(1, 1, 10).with_time_in_force(TimeInForce::Aon);
        assert_eq!(aon_market.validate(), Err(ErrorCode::OrderTypeInvalid));

        let gtc_market = Order::buy_market(1, 1, 10).with_time_in_force(TimeInForce::Gtc);
        assert_eq!(gtc_market.validate(), Err(ErrorCode::OrderTifInvalid));

        let aon_limit = Order::buy_limit(1, 1, 100, 10).with_time_in_force(TimeInForce::Aon);
        assert!(aon_limit.validate().is_ok());
    }

    #[test]
    fn test_visible_and_hidden_quantities() {
        let mut o = Order::buy_limit(1, 1, 100, 100).with_max_visible(30);
        assert!(o.is_iceberg());
        assert_eq!(o.visible_quantity(), 30);
        assert_eq!(o.hidden_quantity(), 70);

        o.fill(80);
        assert_eq!(o.leaves_quantity, 20);
        assert_eq!(o.visible_quantity(), 20);
        assert_eq!(o.hidden_quantity(), 0);
        assert_eq!(o.status, OrderStatus::PartiallyFilled);

        o.fill(20);
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn test_fill_keeps_quantity_conservation() {
        let mut o = Order::sell_limit(1, 1, 100, 10);
        o.fill(4);
        assert_eq!(o.executed_quantity + o.leaves_quantity, o.quantity);
        o.fill(6);
        assert_eq!(o.executed_quantity + o.leaves_quantity, o.quantity);
    }

    #[test]
    fn test_trailing_validation() {
        let t = Order::trailing_stop(1, 1, Side::Sell, 5, 0, 0);
        assert_eq!(t.validate(), Err(ErrorCode::OrderParametersInvalid));

        let t = Order::trailing_stop(1, 1, Side::Sell, 5, 5, 1);
        assert!(t.validate().is_ok());

        // Percentage distance (0.01% units) is allowed.
        let t = Order::trailing_stop(1, 1, Side::Sell, 5, -100, 0);
        assert!(t.validate().is_ok());

        // Mixing tick distance with percentage step (or vice versa) is not.
        let t = Order::trailing_stop(1, 1, Side::Sell, 5, -100, 1);
        assert_eq!(t.validate(), Err(ErrorCode::OrderParametersInvalid));
    }
}
