//! Risk pipeline: per-account positions, PnL and funding accounting.

pub mod engine;
pub mod position;

pub use engine::{mark_price, RiskEngine};
pub use position::{Position, PositionSide};
