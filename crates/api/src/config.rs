use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use inkcal_core::factors::{PlausibleBand, DEFAULT_PLAUSIBLE_MAX, DEFAULT_PLAUSIBLE_MIN};
use inkcal_core::tuner::{
    TunerOptions, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, MIN_TUNING_ENTRIES,
};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining in-flight requests at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub calibration: CalibrationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    ///
    /// Calibration settings are read by [`CalibrationConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            calibration: CalibrationConfig::from_env(),
        }
    }
}

/// Calibration store and auto-tuner settings.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// How long an in-memory calibration stays fresh.
    pub cache_ttl_secs: u64,
    /// Directory holding the `{kind}.json` local cache files.
    pub cache_dir: PathBuf,
    /// Bound on each calibration database call.
    pub db_timeout_secs: u64,
    pub tuner: TunerOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_dir: PathBuf::from(".calibration-cache"),
            db_timeout_secs: 5,
            tuner: TunerOptions::default(),
        }
    }
}

impl CalibrationConfig {
    /// | Env Var                      | Default              |
    /// |------------------------------|----------------------|
    /// | `CALIBRATION_CACHE_TTL_SECS` | `300`                |
    /// | `CALIBRATION_CACHE_DIR`      | `.calibration-cache` |
    /// | `CALIBRATION_DB_TIMEOUT_SECS`| `5`                  |
    /// | `TUNING_MIN_ENTRIES`         | `5`                  |
    /// | `TUNING_MAX_ITERATIONS`      | `200`                |
    /// | `TUNING_TOLERANCE`           | `1e-6`               |
    /// | `TUNING_INCLUDE_BASE`        | `false`              |
    /// | `PLAUSIBLE_FACTOR_MIN`       | `0.005`              |
    /// | `PLAUSIBLE_FACTOR_MAX`       | `0.5`                |
    ///
    /// # Panics
    ///
    /// Panics if a variable is set but does not parse, or if the plausible
    /// range is empty.
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("CALIBRATION_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".calibration-cache"));

        let band = PlausibleBand {
            min: env_or("PLAUSIBLE_FACTOR_MIN", DEFAULT_PLAUSIBLE_MIN),
            max: env_or("PLAUSIBLE_FACTOR_MAX", DEFAULT_PLAUSIBLE_MAX),
        };
        assert!(
            band.min < band.max,
            "PLAUSIBLE_FACTOR_MIN must be below PLAUSIBLE_FACTOR_MAX"
        );

        Self {
            cache_ttl_secs: env_or("CALIBRATION_CACHE_TTL_SECS", 300),
            cache_dir,
            db_timeout_secs: env_or("CALIBRATION_DB_TIMEOUT_SECS", 5),
            tuner: TunerOptions {
                min_entries: env_or("TUNING_MIN_ENTRIES", MIN_TUNING_ENTRIES),
                max_iterations: env_or("TUNING_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS),
                tolerance: env_or("TUNING_TOLERANCE", DEFAULT_TOLERANCE),
                include_base: env_or("TUNING_INCLUDE_BASE", false),
                band,
            },
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value: {raw:?}")),
        Err(_) => default,
    }
}
