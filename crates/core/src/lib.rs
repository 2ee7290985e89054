//! Domain logic for the ink calibration service.
//!
//! Everything in this crate is pure: channel and factor types, the ink
//! consumption model, batch validation with MAE statistics, and the
//! deterministic auto-tuner. Persistence and HTTP live in `inkcal-db` and
//! `inkcal-api`.

pub mod channel;
pub mod consumption;
pub mod error;
pub mod factors;
pub mod kind;
pub mod pagination;
pub mod test_data;
pub mod threshold_validation;
pub mod tuner;
pub mod types;
pub mod validator;
