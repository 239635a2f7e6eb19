use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tripwise::error::AppError;
use tripwise::mobility::congestion::{
    BucketConfig, CongestionModel, HistoricalPatterns, LevelBreakpoints, SearchPolicy,
    TimeBucketClassifier, WindowSearch,
};
use tripwise::mobility::memory::{
    InMemoryLedger, InMemoryRecommendationRepository, InMemoryTripRepository,
};
use tripwise::mobility::recommendations::{
    AddressResolutionError, AddressResolver, RecommendationEngine, ResolvedAddress, RouteEstimator,
    RouteUnavailableError,
};
use tripwise::mobility::rewards::{RewardCalculator, RewardConfig};
use tripwise::mobility::router::MobilityServices;
use tripwise::mobility::trips::TripService;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Deterministic stand-in for the external geocoding collaborator: every
/// non-empty address maps to a stable point inside the metro bounding box.
pub(crate) struct StaticAddressResolver;

impl AddressResolver for StaticAddressResolver {
    fn resolve(&self, address: &str) -> Result<ResolvedAddress, AddressResolutionError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Err(AddressResolutionError {
                address: address.to_string(),
                reason: "address is empty after normalization".to_string(),
            });
        }

        let hash = fnv1a(normalized.as_bytes());
        let lat = 37.40 + (hash % 3_000) as f64 / 10_000.0;
        let lng = 126.80 + ((hash >> 16) % 4_000) as f64 / 10_000.0;

        Ok(ResolvedAddress {
            lat,
            lng,
            normalized_address: normalized,
        })
    }
}

fn normalize_address(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Great-circle route estimate at a fixed average speed, slowed during the
/// weekday commute peaks.
pub(crate) struct HaversineRouteEstimator {
    pub(crate) average_speed_kmh: f64,
    pub(crate) rush_hour_factor: f64,
}

impl Default for HaversineRouteEstimator {
    fn default() -> Self {
        Self {
            average_speed_kmh: 28.0,
            rush_hour_factor: 1.25,
        }
    }
}

impl RouteEstimator for HaversineRouteEstimator {
    fn estimate_duration(
        &self,
        origin: &ResolvedAddress,
        destination: &ResolvedAddress,
        departure: DateTime<Utc>,
    ) -> Result<u32, RouteUnavailableError> {
        let km = haversine_km(origin.lat, origin.lng, destination.lat, destination.lng);
        let mut minutes = km / self.average_speed_kmh * 60.0;

        let hour = departure.hour();
        if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
            minutes *= self.rush_hour_factor;
        }

        Ok((minutes.round() as u32).max(5))
    }
}

fn haversine_km(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6_371.0;
    let d_lat = (lat_b - lat_a).to_radians();
    let d_lng = (lng_b - lng_a).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Hourly pattern table seeded with the metro hotspots the congestion feed
/// tracks.
pub(crate) fn default_patterns() -> HistoricalPatterns {
    HistoricalPatterns::baseline()
        .with_location_factor("gangnam", 1.3)
        .with_location_factor("hongdae", 1.2)
        .with_location_factor("myeongdong", 1.15)
}

pub(crate) type ApiServices = MobilityServices<
    StaticAddressResolver,
    HaversineRouteEstimator,
    InMemoryRecommendationRepository,
    InMemoryTripRepository,
    InMemoryLedger,
>;

/// Assemble the engine, trip service, and ledger over in-memory storage.
pub(crate) fn build_services(currency_code: &str) -> Result<Arc<ApiServices>, AppError> {
    let classifier = TimeBucketClassifier::new(BucketConfig::standard())?;
    let patterns = default_patterns();
    let model = Arc::new(CongestionModel::new(
        Arc::new(patterns.clone()),
        patterns,
        classifier.clone(),
        LevelBreakpoints::default(),
        30,
    )?);

    let recommendations = Arc::new(InMemoryRecommendationRepository::default());
    let trips = Arc::new(InMemoryTripRepository::default());
    let ledger = Arc::new(InMemoryLedger::new(currency_code));

    let engine = RecommendationEngine::new(
        Arc::new(StaticAddressResolver),
        Arc::new(HaversineRouteEstimator::default()),
        recommendations.clone(),
        WindowSearch::new(model.clone(), SearchPolicy::default()),
    );
    let calculator = RewardCalculator::new(RewardConfig::default(), classifier)?;
    let trip_service = TripService::new(recommendations, trips, ledger.clone(), model, calculator);

    Ok(Arc::new(MobilityServices {
        engine,
        trips: trip_service,
        ledger,
    }))
}
