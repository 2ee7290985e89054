//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod calibration_record_repo;
pub mod test_print_repo;
pub mod tuning_run_repo;

pub use calibration_record_repo::CalibrationRecordRepo;
pub use test_print_repo::TestPrintRepo;
pub use tuning_run_repo::TuningRunRepo;
