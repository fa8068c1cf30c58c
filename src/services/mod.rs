pub mod analyzer;
pub mod clock;
pub mod indicator_cache;
pub mod optimizer;
pub mod patterns;
pub mod signals;
pub mod trend;
pub mod tuning;

pub use analyzer::{Reference, SignalAnalyzer, SignalReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use indicator_cache::{cache_key, CacheEntry, EntryStore, Fingerprint, IndicatorCache};
pub use optimizer::{
    BackgroundOptimizer, NoopOptimizer, OptimizationOutcome, OptimizerState, ParamOptimizer,
};
pub use patterns::PatternDetector;
pub use signals::{IndicatorLibrary, StandardIndicators};
pub use trend::TrendConsensusScorer;
pub use tuning::VolatilityTuner;
