use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Trip, TripId, TripStatus};
use super::repository::TripRepository;
use crate::mobility::congestion::{CongestionModel, CongestionSourceError};
use crate::mobility::recommendations::{
    Recommendation, RecommendationId, RecommendationRepository, RepositoryError,
};
use crate::mobility::rewards::{
    CompletionReward, DepartureReward, IdempotencyKey, LedgerEntry, LedgerError, RewardCalculator,
    RewardKind, TransactionKind, WalletLedger,
};
use crate::mobility::UserId;

static TRIP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_trip_id() -> TripId {
    let id = TRIP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TripId(format!("trip-{id:06}"))
}

/// Outcome of a successful `start`: the claimed trip plus its payout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedTrip {
    pub trip: Trip,
    pub departure_reward: DepartureReward,
    pub transaction: LedgerEntry,
}

/// Outcome of a successful `arrive`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTrip {
    pub trip: Trip,
    pub completion_reward: CompletionReward,
    pub transaction: LedgerEntry,
}

#[derive(Debug, thiserror::Error)]
pub enum TripServiceError {
    #[error("recommendation not found")]
    RecommendationNotFound,
    #[error("trip not found")]
    TripNotFound,
    #[error("recommendation belongs to another user")]
    NotOwner,
    #[error("recommendation already has a trip")]
    AlreadyStarted,
    #[error("trip state does not allow this transition")]
    InvalidState,
    #[error(transparent)]
    Congestion(#[from] CongestionSourceError),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Drives Recommendation -> Trip transitions and pays rewards exactly once.
///
/// Each transition executes as one unit: the store's atomic claim/compare-
/// and-set enforces uniqueness, and a failed ledger credit rolls the state
/// change back so nothing is ever partially applied.
pub struct TripService<R, T, L> {
    recommendations: Arc<R>,
    trips: Arc<T>,
    ledger: Arc<L>,
    model: Arc<CongestionModel>,
    calculator: RewardCalculator,
}

impl<R, T, L> TripService<R, T, L>
where
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    pub fn new(
        recommendations: Arc<R>,
        trips: Arc<T>,
        ledger: Arc<L>,
        model: Arc<CongestionModel>,
        calculator: RewardCalculator,
    ) -> Self {
        Self {
            recommendations,
            trips,
            ledger,
            model,
            calculator,
        }
    }

    /// Claim the recommendation, create the trip, and credit the departure
    /// reward. A second `start` on the same recommendation fails with
    /// `AlreadyStarted` and pays nothing.
    pub fn start(
        &self,
        recommendation_id: &RecommendationId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<StartedTrip, TripServiceError> {
        let recommendation = self
            .recommendations
            .fetch(recommendation_id)
            .map_err(TripServiceError::Repository)?
            .ok_or(TripServiceError::RecommendationNotFound)?;

        if recommendation.user_id != *user_id {
            return Err(TripServiceError::NotOwner);
        }

        // Score the actual departure instant before claiming anything; the
        // model is side-effect free.
        let departure_slot = self.model.score_slot(&recommendation.location_key, now)?;
        let reward = self
            .calculator
            .departure_reward(&recommendation, now, departure_slot.level);

        let trip = Trip {
            id: next_trip_id(),
            recommendation_id: recommendation_id.clone(),
            user_id: user_id.clone(),
            status: TripStatus::Ongoing,
            planned_departure: recommendation.window_start,
            started_at: now,
            arrived_at: None,
            predicted_duration_min: recommendation.expected_duration_min,
            actual_duration_min: None,
        };

        let trip = match self.trips.claim(trip) {
            Ok(trip) => trip,
            Err(RepositoryError::Conflict) => return Err(TripServiceError::AlreadyStarted),
            Err(err) => return Err(TripServiceError::Repository(err)),
        };

        let description = departure_description(&recommendation, &reward);
        match self.ledger.credit(
            user_id,
            TransactionKind::Earn,
            reward.amount,
            &description,
            Some(&trip.id),
            IdempotencyKey::for_trip(&trip.id, RewardKind::Departure),
            now,
        ) {
            Ok(transaction) => {
                tracing::info!(
                    trip = %trip.id.0,
                    amount = reward.amount,
                    multiplier = reward.multiplier,
                    "trip started, departure reward credited"
                );
                Ok(StartedTrip {
                    trip,
                    departure_reward: reward,
                    transaction,
                })
            }
            Err(credit_err) => {
                // All-or-nothing: the claim must not survive a failed credit.
                if let Err(release_err) = self.trips.release(&trip.id) {
                    tracing::error!(
                        trip = %trip.id.0,
                        %release_err,
                        "failed to release trip claim after credit failure"
                    );
                }
                Err(credit_err.into())
            }
        }
    }

    /// Transition an ongoing trip to arrived and credit the completion
    /// reward. Replays against an arrived trip fail with `InvalidState`.
    pub fn arrive(
        &self,
        trip_id: &TripId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<CompletedTrip, TripServiceError> {
        let trip = self
            .trips
            .fetch(trip_id)
            .map_err(TripServiceError::Repository)?
            .ok_or(TripServiceError::TripNotFound)?;

        if trip.user_id != *user_id {
            return Err(TripServiceError::NotOwner);
        }
        if trip.status != TripStatus::Ongoing {
            return Err(TripServiceError::InvalidState);
        }

        let elapsed = now.signed_duration_since(trip.started_at).num_seconds();
        let actual_duration_min = ((elapsed.max(0) as f64) / 60.0).round() as u32;

        let updated = match self.trips.finish(trip_id, now, actual_duration_min) {
            Ok(updated) => updated,
            // Lost a race against another arrive on the same trip.
            Err(RepositoryError::Conflict) => return Err(TripServiceError::InvalidState),
            Err(err) => return Err(TripServiceError::Repository(err)),
        };

        let reward = self
            .calculator
            .completion_reward(trip.predicted_duration_min, actual_duration_min);

        let description = completion_description(trip_id, &reward);
        match self.ledger.credit(
            user_id,
            TransactionKind::Earn,
            reward.amount,
            &description,
            Some(trip_id),
            IdempotencyKey::for_trip(trip_id, RewardKind::Completion),
            now,
        ) {
            Ok(transaction) => {
                tracing::info!(
                    trip = %trip_id.0,
                    amount = reward.amount,
                    actual_duration_min,
                    "trip arrived, completion reward credited"
                );
                Ok(CompletedTrip {
                    trip: updated,
                    completion_reward: reward,
                    transaction,
                })
            }
            Err(credit_err) => {
                if let Err(reopen_err) = self.trips.reopen(trip_id) {
                    tracing::error!(
                        trip = %trip_id.0,
                        %reopen_err,
                        "failed to reopen trip after credit failure"
                    );
                }
                Err(credit_err.into())
            }
        }
    }

    /// The caller's trips, newest first.
    pub fn history(&self, user_id: &UserId) -> Result<Vec<Trip>, TripServiceError> {
        self.trips
            .history(user_id)
            .map_err(TripServiceError::Repository)
    }
}

fn departure_description(recommendation: &Recommendation, reward: &DepartureReward) -> String {
    format!(
        "Departure reward ({:.2}x) - {} to {}",
        reward.multiplier, recommendation.origin_address, recommendation.destination_address
    )
}

fn completion_description(trip_id: &TripId, reward: &CompletionReward) -> String {
    if reward.accuracy_bonus > 0 {
        format!(
            "Completion reward for {} (accuracy bonus {})",
            trip_id.0, reward.accuracy_bonus
        )
    } else {
        format!("Completion reward for {}", trip_id.0)
    }
}
