pub mod indicators;
pub mod pattern;
pub mod series;
pub mod timeframe;
pub mod trend;

pub use indicators::*;
pub use pattern::*;
pub use series::*;
pub use timeframe::*;
pub use trend::*;
