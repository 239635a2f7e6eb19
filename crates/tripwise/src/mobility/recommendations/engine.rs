use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Recommendation, RecommendationId};
use super::repository::{RecommendationRepository, RepositoryError};
use crate::mobility::congestion::{ScoredSlot, WindowSearch, WindowSearchError, WindowSelection};
use crate::mobility::UserId;

/// Resolved coordinates for a free-form address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub lat: f64,
    pub lng: f64,
    pub normalized_address: String,
}

#[derive(Debug, thiserror::Error)]
#[error("could not resolve address '{address}': {reason}")]
pub struct AddressResolutionError {
    pub address: String,
    pub reason: String,
}

/// Geocoding capability consumed by the engine; implemented by an external
/// collaborator.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, address: &str) -> Result<ResolvedAddress, AddressResolutionError>;
}

#[derive(Debug, thiserror::Error)]
#[error("route estimate unavailable: {0}")]
pub struct RouteUnavailableError(pub String);

/// Routable duration estimate between two resolved points.
pub trait RouteEstimator: Send + Sync {
    fn estimate_duration(
        &self,
        origin: &ResolvedAddress,
        destination: &ResolvedAddress,
        departure: DateTime<Utc>,
    ) -> Result<u32, RouteUnavailableError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error(transparent)]
    Address(#[from] AddressResolutionError),
    #[error(transparent)]
    Route(#[from] RouteUnavailableError),
    #[error("no feasible departure window inside the search horizon")]
    NoFeasibleWindow,
    #[error("recommendation unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

static RECOMMENDATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_recommendation_id() -> RecommendationId {
    let id = RECOMMENDATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RecommendationId(format!("rec-{id:06}"))
}

/// Orchestrates address resolution, the window search, and persistence for a
/// single origin/destination pair.
pub struct RecommendationEngine<G, E, R> {
    resolver: Arc<G>,
    routes: Arc<E>,
    repository: Arc<R>,
    search: WindowSearch,
}

impl<G, E, R> RecommendationEngine<G, E, R>
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
{
    pub fn new(resolver: Arc<G>, routes: Arc<E>, repository: Arc<R>, search: WindowSearch) -> Self {
        Self {
            resolver,
            routes,
            repository,
            search,
        }
    }

    /// Produce and persist a recommendation for the caller.
    pub fn recommend(
        &self,
        user_id: &UserId,
        origin_address: &str,
        destination_address: &str,
        region_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, RecommendationError> {
        let origin = self.resolver.resolve(origin_address)?;
        let destination = self.resolver.resolve(destination_address)?;

        let location_key = region_code
            .map(location_key)
            .unwrap_or_else(|| location_key(&destination.normalized_address));

        let horizon = Duration::hours(self.search.policy().recommendation_horizon_hours);
        let selection = self.run_search(&location_key, now, horizon)?;
        let best = &selection.best;

        let expected_duration_min =
            self.routes
                .estimate_duration(&origin, &destination, best.slot.start)?;

        let bucket_name = self
            .search
            .model()
            .classifier()
            .config()
            .name(best.bucket)
            .to_string();
        let rationale = render_rationale(now, best, &bucket_name);

        let recommendation = Recommendation {
            id: next_recommendation_id(),
            user_id: user_id.clone(),
            origin_address: origin.normalized_address,
            destination_address: destination.normalized_address,
            location_key,
            recommended_bucket: best.bucket,
            window_start: best.slot.start,
            window_end: best.slot.end,
            expected_duration_min,
            expected_congestion_level: best.level,
            rationale,
            created_at: now,
        };

        let stored = self.repository.insert(recommendation)?;
        tracing::info!(
            recommendation = %stored.id.0,
            bucket = stored.recommended_bucket.code(),
            level = stored.expected_congestion_level.label(),
            "recommendation created"
        );
        Ok(stored)
    }

    /// Standalone optimal-time lookup over a caller-chosen horizon. Shares the
    /// selection routine with `recommend`.
    pub fn optimal_window(
        &self,
        location: &str,
        search_start: DateTime<Utc>,
        window_hours: i64,
    ) -> Result<WindowSelection, RecommendationError> {
        self.run_search(
            &location_key(location),
            search_start,
            Duration::hours(window_hours),
        )
    }

    fn run_search(
        &self,
        location: &str,
        start: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<WindowSelection, RecommendationError> {
        self.search
            .search(location, start, horizon)
            .map_err(|err| match err {
                WindowSearchError::NoFeasibleWindow => RecommendationError::NoFeasibleWindow,
                WindowSearchError::Source(cause) => {
                    RecommendationError::Unavailable(cause.to_string())
                }
            })
    }
}

/// Normalize a region code or address into the congestion lookup key.
pub fn location_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_dash = true;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            key.push('-');
            last_dash = true;
        }
    }
    while key.ends_with('-') {
        key.pop();
    }
    if key.is_empty() {
        "default".to_string()
    } else {
        key
    }
}

/// Deterministic rationale template combining timing, bucket name, and level.
fn render_rationale(now: DateTime<Utc>, best: &ScoredSlot, bucket_name: &str) -> String {
    let minutes_until = (best.slot.start - now).num_minutes().max(0);
    let timing = if minutes_until <= 5 {
        "right away".to_string()
    } else if minutes_until <= 30 {
        format!("in {minutes_until} min")
    } else {
        format!("in {}h {:02}min", minutes_until / 60, minutes_until % 60)
    };

    format!(
        "Departing {timing} during the {bucket_name} window looks best; expected congestion: {}.",
        best.level.label()
    )
}
