use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mobility::congestion::{CongestionLevel, TimeBucket};
use crate::mobility::UserId;

/// Identifier wrapper for persisted recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub String);

/// A congestion-window recommendation for one origin/destination pair.
///
/// Immutable after creation; consumed by at most one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub user_id: UserId,
    pub origin_address: String,
    pub destination_address: String,
    /// Derived key the congestion model was queried with; reused when the
    /// actual departure is scored at trip start.
    pub location_key: String,
    pub recommended_bucket: TimeBucket,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub expected_duration_min: u32,
    pub expected_congestion_level: CongestionLevel,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}
