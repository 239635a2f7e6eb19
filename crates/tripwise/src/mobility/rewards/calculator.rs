use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mobility::congestion::{CongestionLevel, TimeBucketClassifier};
use crate::mobility::recommendations::Recommendation;

/// Operator-tunable reward table, validated once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub departure_base: i64,
    pub completion_base: i64,
    /// Applied when the actual departure falls inside the recommended window.
    pub follow_window_bonus: f64,
    /// Applied when congestion at departure is at or below the threshold band.
    pub low_congestion_bonus: f64,
    pub low_congestion_threshold: CongestionLevel,
    /// Hard clamp on the summed departure multiplier.
    pub multiplier_ceiling: f64,
    pub accuracy_tight_margin_min: u32,
    pub accuracy_tight_bonus: i64,
    pub accuracy_loose_margin_min: u32,
    pub accuracy_loose_bonus: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            departure_base: 100,
            completion_base: 50,
            follow_window_bonus: 0.30,
            low_congestion_bonus: 0.50,
            low_congestion_threshold: CongestionLevel::Good,
            multiplier_ceiling: 2.4,
            accuracy_tight_margin_min: 5,
            accuracy_tight_bonus: 30,
            accuracy_loose_margin_min: 10,
            accuracy_loose_bonus: 15,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RewardConfigError {
    #[error("base rewards must be positive")]
    NonPositiveBase,
    #[error("bonus fractions must be finite and non-negative")]
    InvalidBonus,
    #[error("multiplier ceiling {0} must be at least 1.0")]
    InvalidCeiling(f64),
    #[error("tight accuracy margin must not exceed the loose margin")]
    InvertedMargins,
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), RewardConfigError> {
        if self.departure_base <= 0 || self.completion_base <= 0 {
            return Err(RewardConfigError::NonPositiveBase);
        }
        for fraction in [self.follow_window_bonus, self.low_congestion_bonus] {
            if !fraction.is_finite() || fraction < 0.0 {
                return Err(RewardConfigError::InvalidBonus);
            }
        }
        if !self.multiplier_ceiling.is_finite() || self.multiplier_ceiling < 1.0 {
            return Err(RewardConfigError::InvalidCeiling(self.multiplier_ceiling));
        }
        if self.accuracy_tight_margin_min > self.accuracy_loose_margin_min {
            return Err(RewardConfigError::InvertedMargins);
        }
        Ok(())
    }
}

/// Discrete contribution to a departure multiplier, for transparent payout
/// breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    TimeBucket,
    FollowedRecommendation,
    LowCongestion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedBonus {
    pub kind: BonusKind,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureReward {
    pub amount: i64,
    pub base_reward: i64,
    pub multiplier: f64,
    pub bonuses: Vec<AppliedBonus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReward {
    pub amount: i64,
    pub base_reward: i64,
    pub accuracy_bonus: i64,
}

/// Pure reward computations over immutable inputs; no I/O.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    config: RewardConfig,
    classifier: TimeBucketClassifier,
}

impl RewardCalculator {
    pub fn new(
        config: RewardConfig,
        classifier: TimeBucketClassifier,
    ) -> Result<Self, RewardConfigError> {
        config.validate()?;
        Ok(Self { config, classifier })
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Departure payout: base x (1 + applicable bonus fractions), clamped at
    /// the configured ceiling. The bucket bonus keys off the bucket the actual
    /// departure falls in, not the recommended one.
    pub fn departure_reward(
        &self,
        recommendation: &Recommendation,
        departure_at: DateTime<Utc>,
        level_at_departure: CongestionLevel,
    ) -> DepartureReward {
        let bucket = self.classifier.classify(departure_at.time());
        let mut bonuses = vec![AppliedBonus {
            kind: BonusKind::TimeBucket,
            fraction: self.classifier.config().bonus(bucket),
        }];

        if departure_at >= recommendation.window_start && departure_at <= recommendation.window_end
        {
            bonuses.push(AppliedBonus {
                kind: BonusKind::FollowedRecommendation,
                fraction: self.config.follow_window_bonus,
            });
        }

        if level_at_departure <= self.config.low_congestion_threshold {
            bonuses.push(AppliedBonus {
                kind: BonusKind::LowCongestion,
                fraction: self.config.low_congestion_bonus,
            });
        }

        let summed: f64 = 1.0 + bonuses.iter().map(|bonus| bonus.fraction).sum::<f64>();
        let multiplier = summed.min(self.config.multiplier_ceiling);
        let amount = (self.config.departure_base as f64 * multiplier).round() as i64;

        DepartureReward {
            amount,
            base_reward: self.config.departure_base,
            multiplier,
            bonuses,
        }
    }

    /// Completion payout: base plus a flat accuracy bonus keyed on how close
    /// the actual duration landed to the prediction.
    pub fn completion_reward(&self, predicted_min: u32, actual_min: u32) -> CompletionReward {
        let diff = predicted_min.abs_diff(actual_min);
        let accuracy_bonus = if diff <= self.config.accuracy_tight_margin_min {
            self.config.accuracy_tight_bonus
        } else if diff <= self.config.accuracy_loose_margin_min {
            self.config.accuracy_loose_bonus
        } else {
            0
        };

        CompletionReward {
            amount: self.config.completion_base + accuracy_bonus,
            base_reward: self.config.completion_base,
            accuracy_bonus,
        }
    }
}
