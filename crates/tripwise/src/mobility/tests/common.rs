use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::mobility::congestion::{
    BucketConfig, CongestionLevel, CongestionModel, CongestionSignal, CongestionSource,
    CongestionSourceError, HistoricalPatterns, LevelBreakpoints, SearchPolicy, SignalFreshness,
    TimeBucket, TimeBucketClassifier, WindowSearch,
};
use crate::mobility::memory::{
    InMemoryLedger, InMemoryRecommendationRepository, InMemoryTripRepository,
};
use crate::mobility::recommendations::{
    AddressResolutionError, AddressResolver, Recommendation, RecommendationEngine,
    RecommendationId, ResolvedAddress, RouteEstimator, RouteUnavailableError,
};
use crate::mobility::rewards::{
    IdempotencyKey, LedgerEntry, LedgerError, RewardCalculator, RewardConfig, TransactionKind,
    TransactionPage, WalletAccount, WalletLedger, WalletSummary,
};
use crate::mobility::router::MobilityServices;
use crate::mobility::trips::{TripId, TripService};
use crate::mobility::UserId;

/// Wednesday, 13:00 UTC. Midday keeps the bucket bonus at its smallest tier.
pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 13, 0, 0).single().expect("valid timestamp")
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn classifier() -> TimeBucketClassifier {
    TimeBucketClassifier::new(BucketConfig::standard()).expect("standard table partitions the day")
}

/// Source returning the same live score for every slot.
pub(super) struct ConstantSource(pub(super) f64);

impl CongestionSource for ConstantSource {
    fn query(
        &self,
        _location: &str,
        _at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError> {
        Ok(CongestionSignal {
            score: self.0,
            freshness: SignalFreshness::Live,
        })
    }
}

/// Source scoring slots by their offset from a base instant, for ranking
/// assertions.
pub(super) struct SlotScores {
    pub(super) base: DateTime<Utc>,
    pub(super) step_min: i64,
    pub(super) scores: Vec<f64>,
}

impl CongestionSource for SlotScores {
    fn query(
        &self,
        _location: &str,
        at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError> {
        let index = ((at - self.base).num_minutes() / self.step_min).max(0) as usize;
        let score = self
            .scores
            .get(index)
            .copied()
            .unwrap_or_else(|| self.scores.last().copied().unwrap_or(2.5));
        Ok(CongestionSignal {
            score,
            freshness: SignalFreshness::Live,
        })
    }
}

/// Source that is always down, forcing the baseline fallback path.
pub(super) struct OfflineSource;

impl CongestionSource for OfflineSource {
    fn query(
        &self,
        _location: &str,
        _at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError> {
        Err(CongestionSourceError::Unavailable("feed offline".to_string()))
    }
}

/// Source violating the non-negative score contract.
pub(super) struct NegativeSource;

impl CongestionSource for NegativeSource {
    fn query(
        &self,
        _location: &str,
        _at: DateTime<Utc>,
    ) -> Result<CongestionSignal, CongestionSourceError> {
        Ok(CongestionSignal {
            score: -1.0,
            freshness: SignalFreshness::Live,
        })
    }
}

pub(super) fn model_with(source: Arc<dyn CongestionSource>) -> Arc<CongestionModel> {
    Arc::new(
        CongestionModel::new(
            source,
            HistoricalPatterns::baseline(),
            classifier(),
            LevelBreakpoints::default(),
            30,
        )
        .expect("model config is valid"),
    )
}

pub(super) fn search_with(source: Arc<dyn CongestionSource>) -> WindowSearch {
    WindowSearch::new(model_with(source), SearchPolicy::default())
}

pub(super) struct FixedResolver;

impl AddressResolver for FixedResolver {
    fn resolve(&self, address: &str) -> Result<ResolvedAddress, AddressResolutionError> {
        let trimmed = address.trim();
        if trimmed.is_empty() || trimmed.to_ascii_lowercase().contains("nowhere") {
            return Err(AddressResolutionError {
                address: address.to_string(),
                reason: "no geocoding match".to_string(),
            });
        }
        Ok(ResolvedAddress {
            lat: 37.55,
            lng: 126.99,
            normalized_address: trimmed.to_string(),
        })
    }
}

pub(super) struct FixedRoutes {
    pub(super) minutes: u32,
}

impl RouteEstimator for FixedRoutes {
    fn estimate_duration(
        &self,
        _origin: &ResolvedAddress,
        _destination: &ResolvedAddress,
        _departure: DateTime<Utc>,
    ) -> Result<u32, RouteUnavailableError> {
        Ok(self.minutes)
    }
}

pub(super) type MemoryServices = MobilityServices<
    FixedResolver,
    FixedRoutes,
    InMemoryRecommendationRepository,
    InMemoryTripRepository,
    InMemoryLedger,
>;

pub(super) struct Stack {
    pub(super) services: Arc<MemoryServices>,
    pub(super) trips: Arc<InMemoryTripRepository>,
    pub(super) ledger: Arc<InMemoryLedger>,
}

/// Full service stack over in-memory storage and a flat "very good" feed, so
/// reward outcomes are deterministic.
pub(super) fn build_stack() -> Stack {
    build_stack_with_source(Arc::new(ConstantSource(1.5)))
}

pub(super) fn build_stack_with_source(source: Arc<dyn CongestionSource>) -> Stack {
    let model = model_with(source);
    let recommendations = Arc::new(InMemoryRecommendationRepository::default());
    let trips = Arc::new(InMemoryTripRepository::default());
    let ledger = Arc::new(InMemoryLedger::default());

    let engine = RecommendationEngine::new(
        Arc::new(FixedResolver),
        Arc::new(FixedRoutes { minutes: 45 }),
        recommendations.clone(),
        WindowSearch::new(model.clone(), SearchPolicy::default()),
    );
    let calculator =
        RewardCalculator::new(RewardConfig::default(), classifier()).expect("reward config valid");
    let trip_service = TripService::new(
        recommendations.clone(),
        trips.clone(),
        ledger.clone(),
        model,
        calculator,
    );

    Stack {
        services: Arc::new(MobilityServices {
            engine,
            trips: trip_service,
            ledger: ledger.clone(),
        }),
        trips,
        ledger,
    }
}

/// Ledger that refuses every credit, for rollback assertions.
pub(super) struct FailingLedger;

impl WalletLedger for FailingLedger {
    fn credit(
        &self,
        _account: &UserId,
        _kind: TransactionKind,
        _amount: i64,
        _description: &str,
        _trip_id: Option<&TripId>,
        _key: IdempotencyKey,
        _now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        Err(LedgerError::Unavailable("ledger offline".to_string()))
    }

    fn balance(&self, _account: &UserId) -> Result<i64, LedgerError> {
        Ok(0)
    }

    fn account(&self, account: &UserId) -> Result<WalletAccount, LedgerError> {
        Ok(WalletAccount {
            user_id: account.clone(),
            balance: 0,
            currency_code: "PNT".to_string(),
        })
    }

    fn transactions(
        &self,
        _account: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<TransactionPage, LedgerError> {
        Ok(TransactionPage {
            entries: Vec::new(),
            page,
            page_size,
            total: 0,
        })
    }

    fn summary(&self, _account: &UserId) -> Result<WalletSummary, LedgerError> {
        Ok(WalletSummary {
            balance: 0,
            currency_code: "PNT".to_string(),
            total_earned: 0,
            total_spent: 0,
            transaction_count: 0,
            recent_transactions: Vec::new(),
        })
    }
}

/// Recommendation fixture with a half-hour window opening at `window_start`.
pub(super) fn recommendation(
    id: &str,
    owner: &str,
    window_start: DateTime<Utc>,
) -> Recommendation {
    Recommendation {
        id: RecommendationId(id.to_string()),
        user_id: user(owner),
        origin_address: "Seoul Station".to_string(),
        destination_address: "Gangnam Station".to_string(),
        location_key: "gangnam".to_string(),
        recommended_bucket: TimeBucket::T2,
        window_start,
        window_end: window_start + Duration::minutes(30),
        expected_duration_min: 45,
        expected_congestion_level: CongestionLevel::VeryGood,
        rationale: "Departing right away during the midday window looks best; \
                    expected congestion: very good."
            .to_string(),
        created_at: window_start,
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
