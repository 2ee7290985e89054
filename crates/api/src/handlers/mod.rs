//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the calibration store, the tuning coordinator or a
//! repository in `inkcal_db`, and map errors via [`crate::error::AppError`].

pub mod calibration;
pub mod test_prints;
pub mod tuning;
pub mod validation;
