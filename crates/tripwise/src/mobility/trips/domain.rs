use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mobility::recommendations::RecommendationId;
use crate::mobility::UserId;

/// Identifier wrapper for trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

/// Trip lifecycle. `Arrived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Ongoing,
    Arrived,
}

impl TripStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TripStatus::Ongoing => "ongoing",
            TripStatus::Arrived => "arrived",
        }
    }
}

/// A journey claimed against exactly one recommendation. Created only by the
/// trip service; mutated only by its `arrive` transition; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub recommendation_id: RecommendationId,
    pub user_id: UserId,
    pub status: TripStatus,
    pub planned_departure: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub predicted_duration_min: u32,
    pub actual_duration_min: Option<u32>,
}
