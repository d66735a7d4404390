//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub frontend_url: String,
    pub search_service_url: String,
    pub search_timeout: Duration,
    pub sqids_alphabet: Option<String>,
    pub sqids_min_length: u8,
    /// The term new timetables are created for.
    pub acad_year: i32,
    pub semester: i32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &or_default("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required("DATABASE_URL")?;
        let db_max_connections =
            parse_var("DB_MAX_CONNECTIONS", &or_default("DB_MAX_CONNECTIONS", "5"))?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_url = or_default("FRONTEND_URL", "http://localhost:5173");

        // --- Load Search Service Settings ---
        let search_service_url = required("SEARCH_SERVICE_URL")?
            .trim_end_matches('/')
            .to_string();
        let search_timeout_secs: u64 =
            parse_var("SEARCH_TIMEOUT_SECS", &or_default("SEARCH_TIMEOUT_SECS", "10"))?;

        // --- Load Id Obfuscation Settings ---
        let sqids_alphabet = lookup("SQIDS_ALPHABET");
        let sqids_min_length = parse_var("SQIDS_MIN_LENGTH", &or_default("SQIDS_MIN_LENGTH", "8"))?;

        // --- Load Catalog Term ---
        let acad_year = parse_var("ACAD_YEAR", &required("ACAD_YEAR")?)?;
        let semester = parse_var("SEMESTER", &required("SEMESTER")?)?;

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            frontend_url,
            search_service_url,
            search_timeout: Duration::from_secs(search_timeout_secs),
            sqids_alphabet,
            sqids_min_length,
            acad_year,
            semester,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/timetables"),
        ("SEARCH_SERVICE_URL", "http://search:4000/"),
        ("ACAD_YEAR", "2024"),
        ("SEMESTER", "2"),
    ];

    #[test]
    fn defaults_fill_everything_optional() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.search_service_url, "http://search:4000");
        assert_eq!(config.search_timeout, Duration::from_secs(10));
        assert_eq!(config.sqids_min_length, 8);
        assert_eq!((config.acad_year, config.semester), (2024, 2));
        assert!(config.sqids_alphabet.is_none());
    }

    #[test]
    fn missing_search_url_is_reported_by_name() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SEARCH_SERVICE_URL")
            .collect();
        match Config::from_lookup(lookup(&pairs)) {
            Err(ConfigError::MissingVar(var)) => assert_eq!(var, "SEARCH_SERVICE_URL"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn malformed_numbers_are_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SEARCH_TIMEOUT_SECS", "soon"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue(var, _)) if var == "SEARCH_TIMEOUT_SECS"
        ));
    }
}
