//! Ink calibration API server library.
//!
//! Exposes the building blocks (config, state, error handling, calibration
//! store, tuning coordinator, routes) so integration tests and the binary
//! entrypoint can both access them.

pub mod calibration;
pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod tuning;
