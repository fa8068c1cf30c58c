use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction label shared by trends and pattern biases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Trend {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bullish" | "bull" | "up" => Some(Self::Bullish),
            "bearish" | "bear" | "down" => Some(Self::Bearish),
            "neutral" | "sideways" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// +1 for bullish, -1 for bearish, 0 for neutral.
    pub fn sign(&self) -> i32 {
        match self {
            Self::Bullish => 1,
            Self::Bearish => -1,
            Self::Neutral => 0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Bullish => Self::Bearish,
            Self::Bearish => Self::Bullish,
            Self::Neutral => Self::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trend label plus conviction in that label (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendScore {
    pub trend: Trend,
    pub strength: u8,
}

impl TrendScore {
    pub fn neutral() -> Self {
        Self {
            trend: Trend::Neutral,
            strength: 50,
        }
    }
}

impl Default for TrendScore {
    fn default() -> Self {
        Self::neutral()
    }
}

/// How an asset trend relates to the reference asset trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alignment {
    Aligned,
    Against,
    Neutral,
}

/// Strength tier of the reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceTier {
    Strong,
    Moderate,
    Weak,
}

/// Cross-asset adjustment for one evaluation. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub reference_trend: Trend,
    pub reference_strength: u8,
    pub alignment: Alignment,
    /// Points added to the asset signal.
    pub bonus: i32,
    /// Points removed from the asset signal (non-negative).
    pub penalty: i32,
    /// Pearson correlation of recent returns, in [-1, 1].
    pub price_correlation: f64,
}

impl CorrelationResult {
    /// Net adjustment: bonus minus penalty.
    pub fn net(&self) -> i32 {
        self.bonus - self.penalty
    }
}
