use chrono::{DateTime, Utc};

use super::domain::{Trip, TripId};
use crate::mobility::recommendations::RepositoryError;
use crate::mobility::UserId;

/// Trip storage with claim semantics.
///
/// `claim` and `finish` carry the atomicity the state machine relies on: the
/// uniqueness/status check and the write happen in one step inside the store,
/// so two racing callers can never both succeed.
pub trait TripRepository: Send + Sync {
    /// Insert the trip iff its recommendation has not been claimed yet;
    /// `Conflict` otherwise.
    fn claim(&self, trip: Trip) -> Result<Trip, RepositoryError>;

    /// Remove a freshly claimed trip whose departure credit failed.
    fn release(&self, trip_id: &TripId) -> Result<(), RepositoryError>;

    fn fetch(&self, id: &TripId) -> Result<Option<Trip>, RepositoryError>;

    /// Compare-and-set `ongoing` -> `arrived`; `Conflict` when the trip is in
    /// any other state.
    fn finish(
        &self,
        trip_id: &TripId,
        arrived_at: DateTime<Utc>,
        actual_duration_min: u32,
    ) -> Result<Trip, RepositoryError>;

    /// Roll a `finish` transition back after a failed completion credit.
    fn reopen(&self, trip_id: &TripId) -> Result<(), RepositoryError>;

    /// The caller's trips, newest start first.
    fn history(&self, user_id: &UserId) -> Result<Vec<Trip>, RepositoryError>;
}
