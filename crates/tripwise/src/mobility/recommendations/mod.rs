//! Recommendation creation: collaborator contracts, the orchestrating engine,
//! and the persisted entity.

mod domain;
mod engine;
mod repository;

pub use domain::{Recommendation, RecommendationId};
pub use engine::{
    location_key, AddressResolutionError, AddressResolver, RecommendationEngine,
    RecommendationError, ResolvedAddress, RouteEstimator, RouteUnavailableError,
};
pub use repository::{RecommendationRepository, RepositoryError};
