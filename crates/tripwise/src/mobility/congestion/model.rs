use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::buckets::{TimeBucket, TimeBucketClassifier};

/// Qualitative congestion banding derived from a numeric score.
///
/// Ordering follows the score: `VeryGood < Good < Moderate < Heavy < VeryHeavy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    VeryGood,
    Good,
    Moderate,
    Heavy,
    VeryHeavy,
}

impl CongestionLevel {
    pub const fn label(self) -> &'static str {
        match self {
            CongestionLevel::VeryGood => "very good",
            CongestionLevel::Good => "good",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::VeryHeavy => "very heavy",
        }
    }
}

/// Score thresholds for the level banding. Each field is the inclusive upper
/// bound of its band; anything above `heavy` is `VeryHeavy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBreakpoints {
    pub very_good: f64,
    pub good: f64,
    pub moderate: f64,
    pub heavy: f64,
}

impl Default for LevelBreakpoints {
    fn default() -> Self {
        Self {
            very_good: 2.0,
            good: 2.5,
            moderate: 3.5,
            heavy: 4.0,
        }
    }
}

impl LevelBreakpoints {
    pub fn level_for(&self, score: f64) -> CongestionLevel {
        if score <= self.very_good {
            CongestionLevel::VeryGood
        } else if score <= self.good {
            CongestionLevel::Good
        } else if score <= self.moderate {
            CongestionLevel::Moderate
        } else if score <= self.heavy {
            CongestionLevel::Heavy
        } else {
            CongestionLevel::VeryHeavy
        }
    }

    fn validate(&self) -> Result<(), CongestionModelError> {
        let steps = [self.very_good, self.good, self.moderate, self.heavy];
        if steps.iter().any(|value| !value.is_finite() || *value < 0.0)
            || steps.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(CongestionModelError::InvalidBreakpoints);
        }
        Ok(())
    }
}

/// Whether a sample came from the live source or the baseline fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFreshness {
    Live,
    Fallback,
}

/// Raw congestion observation for one location and instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionSignal {
    pub score: f64,
    pub freshness: SignalFreshness,
}

#[derive(Debug, thiserror::Error)]
pub enum CongestionSourceError {
    #[error("congestion source timed out after {0} ms")]
    Timeout(u64),
    #[error("congestion source unavailable: {0}")]
    Unavailable(String),
    #[error("congestion source returned a negative score {0}")]
    NegativeScore(f64),
}

/// Capability contract for congestion data.
///
/// Implementations must be pure with respect to their inputs at a given data
/// snapshot: the window search samples a location many times per request.
/// Scores are non-negative; lower is better.
pub trait CongestionSource: Send + Sync {
    fn query(
        &self,
        location: &str,
        at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError>;
}

/// Fixed-duration departure slot evaluated by the window search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

/// A slot annotated with its congestion score, band, and clock bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub score: f64,
    pub level: CongestionLevel,
    pub bucket: TimeBucket,
    pub freshness: SignalFreshness,
}

#[derive(Debug, thiserror::Error)]
pub enum CongestionModelError {
    #[error("level breakpoints must be finite, non-negative, and strictly ascending")]
    InvalidBreakpoints,
    #[error("slot duration must be at least one minute")]
    InvalidSlotDuration,
}

/// Scoring facade combining an injected source, the baseline fallback table,
/// the level banding, and the clock-bucket classifier.
pub struct CongestionModel {
    source: Arc<dyn CongestionSource>,
    baseline: HistoricalPatterns,
    breakpoints: LevelBreakpoints,
    classifier: TimeBucketClassifier,
    slot_minutes: i64,
}

impl CongestionModel {
    pub fn new(
        source: Arc<dyn CongestionSource>,
        baseline: HistoricalPatterns,
        classifier: TimeBucketClassifier,
        breakpoints: LevelBreakpoints,
        slot_minutes: i64,
    ) -> Result<Self, CongestionModelError> {
        breakpoints.validate()?;
        if slot_minutes < 1 {
            return Err(CongestionModelError::InvalidSlotDuration);
        }
        Ok(Self {
            source,
            baseline,
            breakpoints,
            classifier,
            slot_minutes,
        })
    }

    /// Score the slot starting at `start`.
    ///
    /// Source timeouts and outages degrade to the baseline table with
    /// `Fallback` freshness; a negative score is a contract violation and is
    /// surfaced instead of being patched over.
    pub fn score_slot(
        &self,
        location: &str,
        start: DateTime<Utc>,
    ) -> Result<ScoredSlot, CongestionSourceError> {
        let signal = match self.source.query(location, start) {
            Ok(signal) if signal.score < 0.0 => {
                return Err(CongestionSourceError::NegativeScore(signal.score))
            }
            Ok(signal) => signal,
            Err(CongestionSourceError::NegativeScore(score)) => {
                return Err(CongestionSourceError::NegativeScore(score))
            }
            Err(cause) => {
                tracing::debug!(%location, %cause, "congestion source degraded, using baseline");
                CongestionSignal {
                    score: self.baseline.score(location, start),
                    freshness: SignalFreshness::Fallback,
                }
            }
        };

        Ok(ScoredSlot {
            slot: Slot {
                start,
                end: start + Duration::minutes(self.slot_minutes),
                location: location.to_string(),
            },
            score: signal.score,
            level: self.breakpoints.level_for(signal.score),
            bucket: self.classifier.classify(start.time()),
            freshness: signal.freshness,
        })
    }

    pub fn classifier(&self) -> &TimeBucketClassifier {
        &self.classifier
    }

    pub fn slot_minutes(&self) -> i64 {
        self.slot_minutes
    }
}

const HOURS_PER_DAY: usize = 24;
const DAYS_PER_WEEK: usize = 7;

/// Weekday hourly profile used when no imported pattern is available. Shaped
/// around the two commute peaks.
const BASELINE_PROFILE: [f64; HOURS_PER_DAY] = [
    1.2, 1.1, 1.0, 1.0, 1.1, 1.4, 2.2, 3.4, 3.8, 3.1, 2.6, 2.8, 3.0, 2.7, 2.6, 2.9, 3.3, 3.8,
    4.0, 3.4, 2.7, 2.2, 1.8, 1.5,
];

/// Hourly congestion averages per weekday with location adjustment factors.
///
/// Scoring interpolates linearly between the current and next hour, applies
/// the weekend or weekday rush-hour multiplier, scales by the location factor,
/// and clamps the result to the 1.0..=5.0 score range.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPatterns {
    hourly: [[f64; HOURS_PER_DAY]; DAYS_PER_WEEK],
    location_factors: BTreeMap<String, f64>,
    weekend_multiplier: f64,
    rush_hour_multiplier: f64,
}

impl HistoricalPatterns {
    pub fn baseline() -> Self {
        Self {
            hourly: [BASELINE_PROFILE; DAYS_PER_WEEK],
            location_factors: BTreeMap::new(),
            weekend_multiplier: 0.8,
            rush_hour_multiplier: 1.3,
        }
    }

    pub fn with_location_factor(mut self, location: &str, factor: f64) -> Self {
        self.location_factors
            .insert(location.to_ascii_lowercase(), factor);
        self
    }

    /// Overlay hourly values from a CSV export with `weekday,hour,score` rows
    /// (weekday as a lowercase English name).
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PatternImportError> {
        let mut patterns = Self::baseline();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        for record in csv_reader.deserialize::<PatternRow>() {
            let row = record?;
            let day = weekday_index(&row.weekday)
                .ok_or_else(|| PatternImportError::InvalidWeekday(row.weekday.clone()))?;
            if row.hour >= HOURS_PER_DAY as u32 {
                return Err(PatternImportError::InvalidHour(row.hour));
            }
            if !row.score.is_finite() || row.score < 0.0 {
                return Err(PatternImportError::InvalidScore(row.score));
            }
            patterns.hourly[day][row.hour as usize] = row.score;
        }

        Ok(patterns)
    }

    pub fn score(&self, location: &str, at: DateTime<Utc>) -> f64 {
        let day = at.weekday().num_days_from_monday() as usize;
        let hour = at.hour() as usize;
        let next_hour = (hour + 1) % HOURS_PER_DAY;

        let current = self.hourly[day][hour];
        let next = self.hourly[day][next_hour];
        let t = f64::from(at.minute()) / 60.0;
        let mut score = (1.0 - t) * current + t * next;

        let weekend = day >= 5;
        if weekend {
            score *= self.weekend_multiplier;
        } else if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
            score *= self.rush_hour_multiplier;
        }

        let factor = self
            .location_factors
            .get(&location.to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0);

        (score * factor).clamp(1.0, 5.0)
    }
}

impl CongestionSource for HistoricalPatterns {
    fn query(
        &self,
        location: &str,
        at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError> {
        Ok(CongestionSignal {
            score: self.score(location, at),
            freshness: SignalFreshness::Live,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PatternRow {
    weekday: String,
    hour: u32,
    score: f64,
}

fn weekday_index(name: &str) -> Option<usize> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(0),
        "tuesday" => Some(1),
        "wednesday" => Some(2),
        "thursday" => Some(3),
        "friday" => Some(4),
        "saturday" => Some(5),
        "sunday" => Some(6),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatternImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("unknown weekday '{0}'")]
    InvalidWeekday(String),
    #[error("hour {0} is out of range")]
    InvalidHour(u32),
    #[error("score {0} must be a finite non-negative value")]
    InvalidScore(f64),
}
