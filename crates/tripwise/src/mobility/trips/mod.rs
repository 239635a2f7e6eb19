//! Trip lifecycle: the claimed entity, its storage contract, and the state
//! machine service that pays rewards on each qualifying transition.

mod domain;
mod repository;
mod service;

pub use domain::{Trip, TripId, TripStatus};
pub use repository::TripRepository;
pub use service::{CompletedTrip, StartedTrip, TripService, TripServiceError};
