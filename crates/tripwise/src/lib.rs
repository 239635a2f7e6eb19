//! Congestion-aware departure recommendations with a point-reward wallet.
//!
//! The crate is organized around the `mobility` module: congestion scoring and
//! window search, the recommendation engine, the trip lifecycle service, and
//! the wallet ledger that pays rewards exactly once per qualifying trip event.

pub mod config;
pub mod error;
pub mod mobility;
pub mod telemetry;
