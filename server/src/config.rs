//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// JSON file with per-table planner options
    pub planners_file: PathBuf,
    /// Upper bound on one existing-record lookup
    pub lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let planners_file = env::var("PLANNERS_FILE")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingPlannersFile)?;

        let lookup_timeout = env::var("LOOKUP_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidLookupTimeout)?;

        Ok(Self {
            host,
            port,
            database_url,
            planners_file,
            lookup_timeout,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("PLANNERS_FILE environment variable is required")]
    MissingPlannersFile,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid LOOKUP_TIMEOUT_MS value")]
    InvalidLookupTimeout,
}
