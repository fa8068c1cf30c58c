//! Cross-asset adjustment against a reference asset's trend.

use super::TrendConsensusScorer;
use crate::services::signals::stats::{pct_returns, pearson};
use crate::types::{Alignment, CorrelationResult, OhlcvSeries, ReferenceTier, Trend};
use tracing::debug;

/// Scale a base adjustment by how closely the two assets move together.
///
/// Uncorrelated prices keep half the effect; perfectly (anti-)correlated
/// prices keep all of it.
pub fn scale_by_correlation(base: i32, correlation: f64) -> i32 {
    let strength = if correlation.is_finite() {
        correlation.abs().min(1.0)
    } else {
        0.0
    };
    (base as f64 * (0.5 + 0.5 * strength)).round() as i32
}

impl TrendConsensusScorer {
    /// Bonus or penalty for the asset signal given the reference trend.
    ///
    /// Returns zero adjustment when the reference is below the strength
    /// floor or either trend is neutral.
    pub fn adjust_for_correlation(
        &self,
        asset_trend: Trend,
        reference_trend: Trend,
        reference_strength: u8,
        asset: &OhlcvSeries,
        reference: &OhlcvSeries,
    ) -> CorrelationResult {
        let price_correlation = self.price_correlation(asset, reference);
        let mut result = CorrelationResult {
            reference_trend,
            reference_strength,
            alignment: Alignment::Neutral,
            bonus: 0,
            penalty: 0,
            price_correlation,
        };

        if reference_strength < self.correlation.strength_floor {
            debug!(
                "Reference strength {} below floor {}, skipping adjustment",
                reference_strength, self.correlation.strength_floor
            );
            return result;
        }
        if asset_trend == Trend::Neutral || reference_trend == Trend::Neutral {
            return result;
        }

        let c = &self.correlation;
        let tier = self.reference_tier(reference_strength);
        if asset_trend == reference_trend {
            result.alignment = Alignment::Aligned;
            let base = match tier {
                ReferenceTier::Strong => c.aligned_strong_bonus,
                ReferenceTier::Moderate => c.aligned_moderate_bonus,
                ReferenceTier::Weak => c.aligned_weak_bonus,
            };
            result.bonus = scale_by_correlation(base, price_correlation);
        } else {
            result.alignment = Alignment::Against;
            match tier {
                ReferenceTier::Strong => {
                    result.penalty = scale_by_correlation(c.against_strong_penalty, price_correlation)
                }
                ReferenceTier::Moderate => {
                    result.penalty =
                        scale_by_correlation(c.against_moderate_penalty, price_correlation)
                }
                // A weak reference says little about an independent move.
                ReferenceTier::Weak => {
                    result.bonus = scale_by_correlation(c.against_weak_bonus, price_correlation)
                }
            }
        }

        debug!(
            "Correlation adjustment {:?} ({:?} reference, r={:.3}): +{} -{}",
            result.alignment, tier, price_correlation, result.bonus, result.penalty
        );
        result
    }

    pub fn reference_tier(&self, strength: u8) -> ReferenceTier {
        if strength > self.correlation.strong_threshold {
            ReferenceTier::Strong
        } else if strength > self.correlation.moderate_threshold {
            ReferenceTier::Moderate
        } else {
            ReferenceTier::Weak
        }
    }

    /// Pearson correlation of the last `lookback` returns of both series.
    pub fn price_correlation(&self, asset: &OhlcvSeries, reference: &OhlcvSeries) -> f64 {
        let span = self.correlation.lookback + 1;
        let a = pct_returns(&asset.tail(span).close);
        let b = pct_returns(&reference.tail(span).close);
        pearson(&a, &b)
    }
}
