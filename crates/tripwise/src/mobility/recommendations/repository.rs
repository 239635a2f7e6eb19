use super::domain::{Recommendation, RecommendationId};

/// Error enumeration for storage failures, shared by the entity repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction so the engine and trip service can be exercised in
/// isolation.
pub trait RecommendationRepository: Send + Sync {
    fn insert(&self, recommendation: Recommendation) -> Result<Recommendation, RepositoryError>;
    fn fetch(&self, id: &RecommendationId) -> Result<Option<Recommendation>, RepositoryError>;
}
