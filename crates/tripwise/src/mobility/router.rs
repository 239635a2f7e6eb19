use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::congestion::{ScoredSlot, SearchPrecision};
use super::recommendations::{
    AddressResolver, RecommendationEngine, RecommendationError, RecommendationId,
    RecommendationRepository, RouteEstimator,
};
use super::rewards::{LedgerError, WalletLedger, DEFAULT_PAGE_SIZE};
use super::trips::{TripId, TripRepository, TripService, TripServiceError};
use super::UserId;

/// Identity header populated by the upstream auth gateway. The core trusts
/// the identity, not the transport.
pub const USER_HEADER: &str = "x-user-id";

/// Service bundle shared by every mobility handler.
pub struct MobilityServices<G, E, R, T, L> {
    pub engine: RecommendationEngine<G, E, R>,
    pub trips: TripService<R, T, L>,
    pub ledger: Arc<L>,
}

/// Router builder exposing the recommendation, trip, and wallet endpoints.
pub fn mobility_router<G, E, R, T, L>(services: Arc<MobilityServices<G, E, R, T, L>>) -> Router
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    Router::new()
        .route(
            "/api/v1/trips/recommendations",
            post(recommend_handler::<G, E, R, T, L>),
        )
        .route(
            "/api/v1/trips/recommendations/:recommendation_id/start",
            post(start_handler::<G, E, R, T, L>),
        )
        .route(
            "/api/v1/trips/:trip_id/arrive",
            post(arrive_handler::<G, E, R, T, L>),
        )
        .route("/api/v1/trips", get(history_handler::<G, E, R, T, L>))
        .route(
            "/api/v1/trips/optimal-time",
            get(optimal_time_handler::<G, E, R, T, L>),
        )
        .route(
            "/api/v1/wallet/summary",
            get(wallet_summary_handler::<G, E, R, T, L>),
        )
        .route(
            "/api/v1/wallet/transactions",
            get(wallet_transactions_handler::<G, E, R, T, L>),
        )
        .with_state(services)
}

fn authenticated_user(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
        .ok_or_else(|| {
            let payload = json!({ "error": "missing authenticated user identity" });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

fn error_body(message: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": message.to_string() }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationRequest {
    pub(crate) origin_address: String,
    pub(crate) destination_address: String,
    #[serde(default)]
    pub(crate) region_code: Option<String>,
}

pub(crate) async fn recommend_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
    Json(request): Json<RecommendationRequest>,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    if request.origin_address.trim().is_empty() || request.destination_address.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("origin_address and destination_address are required"),
        )
            .into_response();
    }

    match services.engine.recommend(
        &user,
        &request.origin_address,
        &request.destination_address,
        request.region_code.as_deref(),
        Utc::now(),
    ) {
        Ok(recommendation) => (StatusCode::CREATED, Json(recommendation)).into_response(),
        Err(err @ RecommendationError::Address(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, error_body(err)).into_response()
        }
        Err(err @ RecommendationError::Route(_)) => {
            (StatusCode::BAD_GATEWAY, error_body(err)).into_response()
        }
        Err(err @ RecommendationError::NoFeasibleWindow)
        | Err(err @ RecommendationError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, error_body(err)).into_response()
        }
        Err(other) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(other)).into_response(),
    }
}

fn trip_error_response(err: TripServiceError) -> Response {
    let status = match &err {
        TripServiceError::RecommendationNotFound | TripServiceError::TripNotFound => {
            StatusCode::NOT_FOUND
        }
        TripServiceError::NotOwner => StatusCode::FORBIDDEN,
        TripServiceError::AlreadyStarted | TripServiceError::InvalidState => StatusCode::CONFLICT,
        TripServiceError::Congestion(_) => StatusCode::SERVICE_UNAVAILABLE,
        TripServiceError::Ledger(LedgerError::InsufficientBalance { .. }) => {
            StatusCode::CONFLICT
        }
        TripServiceError::Repository(_) | TripServiceError::Ledger(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error_body(err)).into_response()
}

pub(crate) async fn start_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
    Path(recommendation_id): Path<String>,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = RecommendationId(recommendation_id);
    match services.trips.start(&id, &user, Utc::now()) {
        Ok(started) => (StatusCode::CREATED, Json(started)).into_response(),
        Err(err) => trip_error_response(err),
    }
}

pub(crate) async fn arrive_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
    Path(trip_id): Path<String>,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = TripId(trip_id);
    match services.trips.arrive(&id, &user, Utc::now()) {
        Ok(completed) => (StatusCode::OK, Json(completed)).into_response(),
        Err(err) => trip_error_response(err),
    }
}

pub(crate) async fn history_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.trips.history(&user) {
        Ok(trips) => (StatusCode::OK, Json(json!({ "trips": trips }))).into_response(),
        Err(err) => trip_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptimalTimeQuery {
    #[serde(default)]
    pub(crate) window_hours: Option<i64>,
    #[serde(default)]
    pub(crate) current_time: Option<String>,
    #[serde(default)]
    pub(crate) location: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchWindowView {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptimalTimeView {
    pub(crate) best: ScoredSlot,
    pub(crate) alternatives: Vec<ScoredSlot>,
    pub(crate) precision: SearchPrecision,
    pub(crate) slots_analyzed: usize,
    pub(crate) search_window: SearchWindowView,
}

pub(crate) async fn optimal_time_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
    Query(query): Query<OptimalTimeQuery>,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    if let Err(response) = authenticated_user(&headers) {
        return response;
    }

    let window_hours = query.window_hours.unwrap_or(2);
    if !(1..=24).contains(&window_hours) {
        return (
            StatusCode::BAD_REQUEST,
            error_body("window_hours must be between 1 and 24"),
        )
            .into_response();
    }

    let search_start = match &query.current_time {
        Some(raw) => match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
            Ok(naive) => naive.and_utc(),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body("current_time must use the YYYY-MM-DD HH:MM format"),
                )
                    .into_response()
            }
        },
        None => Utc::now(),
    };

    let location = query.location.as_deref().unwrap_or("default");
    match services
        .engine
        .optimal_window(location, search_start, window_hours)
    {
        Ok(selection) => {
            let view = OptimalTimeView {
                search_window: SearchWindowView {
                    start: search_start,
                    end: search_start + chrono::Duration::hours(window_hours),
                },
                best: selection.best,
                alternatives: selection.alternatives,
                precision: selection.precision,
                slots_analyzed: selection.slots_analyzed,
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err @ RecommendationError::NoFeasibleWindow)
        | Err(err @ RecommendationError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, error_body(err)).into_response()
        }
        Err(other) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(other)).into_response(),
    }
}

pub(crate) async fn wallet_summary_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.ledger.summary(&user) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(err)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionsQuery {
    #[serde(default)]
    pub(crate) page: Option<usize>,
    #[serde(default)]
    pub(crate) page_size: Option<usize>,
}

pub(crate) async fn wallet_transactions_handler<G, E, R, T, L>(
    State(services): State<Arc<MobilityServices<G, E, R, T, L>>>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Response
where
    G: AddressResolver + 'static,
    E: RouteEstimator + 'static,
    R: RecommendationRepository + 'static,
    T: TripRepository + 'static,
    L: WalletLedger + 'static,
{
    let user = match authenticated_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    match services.ledger.transactions(&user, page, page_size) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(err)).into_response(),
    }
}
