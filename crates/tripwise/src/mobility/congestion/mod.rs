//! Congestion scoring: the clock-bucket classifier, the pluggable congestion
//! model, and the departure-window search shared by recommendations and the
//! standalone optimal-time lookup.

mod buckets;
mod model;
mod window;

pub use buckets::{BucketConfig, BucketConfigError, BucketSpan, TimeBucket, TimeBucketClassifier};
pub use model::{
    CongestionLevel, CongestionModel, CongestionModelError, CongestionSignal, CongestionSource,
    CongestionSourceError, HistoricalPatterns, LevelBreakpoints, PatternImportError, ScoredSlot,
    SignalFreshness, Slot,
};
pub use window::{SearchPolicy, SearchPrecision, WindowSearch, WindowSearchError, WindowSelection};
