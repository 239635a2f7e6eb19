use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Identifier for one of the configured slices of the 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 7] = [
        TimeBucket::T0,
        TimeBucket::T1,
        TimeBucket::T2,
        TimeBucket::T3,
        TimeBucket::T4,
        TimeBucket::T5,
        TimeBucket::T6,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            TimeBucket::T0 => "T0",
            TimeBucket::T1 => "T1",
            TimeBucket::T2 => "T2",
            TimeBucket::T3 => "T3",
            TimeBucket::T4 => "T4",
            TimeBucket::T5 => "T5",
            TimeBucket::T6 => "T6",
        }
    }
}

/// Clock span and reward weighting for a single bucket.
///
/// `start` is inclusive, `end` exclusive. An `end` at or before `start` means
/// the span runs up to midnight and wraps (e.g. 21:00-00:00).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSpan {
    pub bucket: TimeBucket,
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub bonus: f64,
}

impl BucketSpan {
    fn contains(&self, minute_of_day: u32) -> bool {
        let start = self.start.hour() * 60 + self.start.minute();
        let end = self.end.hour() * 60 + self.end.minute();
        if end <= start {
            minute_of_day >= start || minute_of_day < end
        } else {
            minute_of_day >= start && minute_of_day < end
        }
    }
}

/// Operator-tunable bucket table. Spans must partition the 24-hour clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub spans: Vec<BucketSpan>,
}

impl BucketConfig {
    /// The canonical seven-bucket table.
    pub fn standard() -> Self {
        fn hm(hour: u32, minute: u32) -> NaiveTime {
            NaiveTime::from_hms_opt(hour, minute, 0).expect("valid bucket boundary")
        }

        let table = [
            (TimeBucket::T0, "morning", hm(6, 0), hm(9, 0), 0.10),
            (TimeBucket::T1, "late morning", hm(9, 0), hm(12, 0), 0.20),
            (TimeBucket::T2, "midday", hm(12, 0), hm(15, 0), 0.10),
            (TimeBucket::T3, "afternoon", hm(15, 0), hm(18, 0), 0.20),
            (TimeBucket::T4, "evening", hm(18, 0), hm(21, 0), 0.10),
            (TimeBucket::T5, "night", hm(21, 0), hm(0, 0), 0.30),
            (TimeBucket::T6, "early hours", hm(0, 0), hm(6, 0), 0.40),
        ];

        Self {
            spans: table
                .into_iter()
                .map(|(bucket, name, start, end, bonus)| BucketSpan {
                    bucket,
                    name: name.to_string(),
                    start,
                    end,
                    bonus,
                })
                .collect(),
        }
    }

    pub fn span(&self, bucket: TimeBucket) -> Option<&BucketSpan> {
        self.spans.iter().find(|span| span.bucket == bucket)
    }

    /// Static bonus fraction for a bucket; zero when the bucket is unconfigured.
    pub fn bonus(&self, bucket: TimeBucket) -> f64 {
        self.span(bucket).map(|span| span.bonus).unwrap_or(0.0)
    }

    /// Display name used in rationale text.
    pub fn name(&self, bucket: TimeBucket) -> &str {
        self.span(bucket).map(|span| span.name.as_str()).unwrap_or("unknown")
    }
}

/// Bucket table validation failures, detected once at startup.
#[derive(Debug, thiserror::Error)]
pub enum BucketConfigError {
    #[error("bucket {0} is configured more than once")]
    Duplicate(&'static str),
    #[error("minute {minute} of the day is covered by no bucket")]
    Gap { minute: u32 },
    #[error("minute {minute} of the day is covered by both {first} and {second}")]
    Overlap {
        minute: u32,
        first: &'static str,
        second: &'static str,
    },
    #[error("bucket {bucket} bonus {bonus} must be a finite non-negative fraction")]
    InvalidBonus { bucket: &'static str, bonus: f64 },
}

/// Total, pure classifier over the 1440 minutes of a day.
///
/// The partition invariant is checked at construction, so `classify` can never
/// fail at call time.
#[derive(Debug, Clone)]
pub struct TimeBucketClassifier {
    config: BucketConfig,
    table: Vec<TimeBucket>,
}

impl TimeBucketClassifier {
    pub fn new(config: BucketConfig) -> Result<Self, BucketConfigError> {
        let mut seen: Vec<TimeBucket> = Vec::new();
        for span in &config.spans {
            if !span.bonus.is_finite() || span.bonus < 0.0 {
                return Err(BucketConfigError::InvalidBonus {
                    bucket: span.bucket.code(),
                    bonus: span.bonus,
                });
            }
            if seen.contains(&span.bucket) {
                return Err(BucketConfigError::Duplicate(span.bucket.code()));
            }
            seen.push(span.bucket);
        }

        let mut table = Vec::with_capacity(MINUTES_PER_DAY as usize);
        for minute in 0..MINUTES_PER_DAY {
            let mut owner: Option<TimeBucket> = None;
            for span in &config.spans {
                if span.contains(minute) {
                    if let Some(first) = owner {
                        return Err(BucketConfigError::Overlap {
                            minute,
                            first: first.code(),
                            second: span.bucket.code(),
                        });
                    }
                    owner = Some(span.bucket);
                }
            }
            table.push(owner.ok_or(BucketConfigError::Gap { minute })?);
        }

        Ok(Self { config, table })
    }

    pub fn classify(&self, time: NaiveTime) -> TimeBucket {
        let minute = time.hour() * 60 + time.minute();
        self.table[minute as usize]
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }
}
