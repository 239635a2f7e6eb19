use crate::config::ConfigError;
use crate::mobility::congestion::{BucketConfigError, CongestionModelError};
use crate::mobility::recommendations::RecommendationError;
use crate::mobility::rewards::RewardConfigError;
use crate::mobility::trips::TripServiceError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Buckets(BucketConfigError),
    Congestion(CongestionModelError),
    Rewards(RewardConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Recommendation(RecommendationError),
    Trip(TripServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Buckets(err) => write!(f, "bucket configuration error: {}", err),
            AppError::Congestion(err) => write!(f, "congestion model error: {}", err),
            AppError::Rewards(err) => write!(f, "reward configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Recommendation(err) => write!(f, "recommendation error: {}", err),
            AppError::Trip(err) => write!(f, "trip error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Buckets(err) => Some(err),
            AppError::Congestion(err) => Some(err),
            AppError::Rewards(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Recommendation(err) => Some(err),
            AppError::Trip(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Recommendation(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Trip(_) => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Buckets(_)
            | AppError::Congestion(_)
            | AppError::Rewards(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<BucketConfigError> for AppError {
    fn from(value: BucketConfigError) -> Self {
        Self::Buckets(value)
    }
}

impl From<CongestionModelError> for AppError {
    fn from(value: CongestionModelError) -> Self {
        Self::Congestion(value)
    }
}

impl From<RewardConfigError> for AppError {
    fn from(value: RewardConfigError) -> Self {
        Self::Rewards(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RecommendationError> for AppError {
    fn from(value: RecommendationError) -> Self {
        Self::Recommendation(value)
    }
}

impl From<TripServiceError> for AppError {
    fn from(value: TripServiceError) -> Self {
        Self::Trip(value)
    }
}
