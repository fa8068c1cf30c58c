//! Omen - indicator caching, pattern detection and trend scoring for OHLCV series

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SignalError};
pub use services::{PatternDetector, SignalAnalyzer, TrendConsensusScorer};
pub use types::*;
