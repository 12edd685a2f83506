//! Result taxonomy for market manager operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by [`MarketManager`](crate::matching::MarketManager)
/// operations.
///
/// Every public operation either completes fully or returns one of these
/// codes with no partial state change left behind. The matching path itself
/// never fails once an operation has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[non_exhaustive]
pub enum ErrorCode {
    /// A symbol with the same id is already registered.
    #[error("duplicate symbol")]
    SymbolDuplicate,

    /// No symbol registered under the given id.
    #[error("symbol not found")]
    SymbolNotFound,

    /// The symbol still has an order book attached and cannot be removed.
    #[error("symbol has an order book")]
    SymbolHasBook,

    /// An order book for the symbol already exists.
    #[error("duplicate order book")]
    OrderBookDuplicate,

    /// No order book exists for the symbol.
    #[error("order book not found")]
    OrderBookNotFound,

    /// An order with the same id is already resting.
    #[error("duplicate order")]
    OrderDuplicate,

    /// No resting order with the given id.
    #[error("order not found")]
    OrderNotFound,

    /// Order id 0 is reserved and rejected.
    #[error("invalid order id")]
    OrderIdInvalid,

    /// Zero quantity, zero limit price, inconsistent stop parameters or a
    /// max-visible quantity larger than the order quantity.
    #[error("invalid order parameters")]
    OrderParametersInvalid,

    /// The order type does not admit the requested combination
    /// (e.g. a market order flagged all-or-none).
    #[error("invalid order type")]
    OrderTypeInvalid,

    /// The time-in-force policy is not valid for the order type
    /// (e.g. a GTC market order).
    #[error("invalid time-in-force")]
    OrderTifInvalid,

    /// Matching is currently disabled; the order was accepted and parked.
    /// This code is informational for front-ends: `add_order` itself still
    /// succeeds while matching is deferred.
    #[error("matching is disabled")]
    MatchingDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::SymbolDuplicate.to_string(), "duplicate symbol");
        assert_eq!(ErrorCode::OrderNotFound.to_string(), "order not found");
        assert_eq!(
            ErrorCode::OrderParametersInvalid.to_string(),
            "invalid order parameters"
        );
    }

    #[test]
    fn test_error_code_is_copy_and_eq() {
        let a = ErrorCode::OrderBookNotFound;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(a, ErrorCode::OrderBookDuplicate);
    }
}
