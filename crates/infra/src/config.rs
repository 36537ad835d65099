//! Store configuration loaded from the environment.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: '{value}'")]
    InvalidVar { var: &'static str, value: String },
}

/// Postgres store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Bounded retries for transient conflicts (serialization failures,
    /// deadlocks, lock timeouts) before the error is surfaced.
    pub max_conflict_retries: u32,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let max_connections =
            parse_u32("GEARLOG_DB_MAX_CONNECTIONS", std::env::var("GEARLOG_DB_MAX_CONNECTIONS").ok(), 5)?;
        let max_conflict_retries = parse_u32(
            "GEARLOG_MAX_CONFLICT_RETRIES",
            std::env::var("GEARLOG_MAX_CONFLICT_RETRIES").ok(),
            3,
        )?;
        Ok(Self {
            database_url,
            max_connections,
            max_conflict_retries,
        })
    }
}

fn parse_u32(var: &'static str, value: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidVar { var, value: raw }),
    }
}
