//! Congestion-window recommendations, trip lifecycle, and the reward wallet.

pub mod congestion;
pub mod memory;
pub mod recommendations;
pub mod rewards;
pub mod router;
pub mod trips;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

/// Authenticated account identity, supplied by the upstream auth gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

pub use congestion::{
    BucketConfig, BucketConfigError, CongestionLevel, CongestionModel, CongestionSource,
    HistoricalPatterns, LevelBreakpoints, ScoredSlot, SearchPolicy, SearchPrecision, Slot,
    TimeBucket, TimeBucketClassifier, WindowSearch, WindowSelection,
};
pub use memory::{InMemoryLedger, InMemoryRecommendationRepository, InMemoryTripRepository};
pub use recommendations::{
    AddressResolutionError, AddressResolver, Recommendation, RecommendationEngine,
    RecommendationError, RecommendationId, RecommendationRepository, RepositoryError,
    ResolvedAddress, RouteEstimator, RouteUnavailableError,
};
pub use rewards::{
    CompletionReward, DepartureReward, IdempotencyKey, LedgerEntry, LedgerError, RewardCalculator,
    RewardConfig, RewardKind, TransactionKind, WalletLedger, WalletSummary,
};
pub use router::{mobility_router, MobilityServices, USER_HEADER};
pub use trips::{CompletedTrip, StartedTrip, Trip, TripId, TripService, TripServiceError, TripStatus};
