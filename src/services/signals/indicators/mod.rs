//! Technical indicator implementations.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::{atr, atr_pct};
pub use ema::ema_series;
pub use macd::macd;
pub use rsi::rsi;
pub use sma::sma;
