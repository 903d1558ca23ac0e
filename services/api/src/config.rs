//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which correctness oracle judges free-text answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleBackend {
    /// The classifier microservice at `classifier_url`.
    Http,
    /// An OpenAI chat model.
    OpenAi,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub question_bank_path: PathBuf,
    pub oracle_backend: OracleBackend,
    pub classifier_url: String,
    pub openai_api_key: Option<String>,
    pub oracle_model: String,
    pub oracle_timeout: Duration,
    pub janitor_interval: Duration,
    pub cors_origin: HeaderValue,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and storage ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let question_bank_path = PathBuf::from(var_or("QUESTION_BANK_PATH", "./seed/questions.json"));

        // --- Correctness oracle ---
        let oracle_backend = match var_or("ORACLE_BACKEND", "http").to_lowercase().as_str() {
            "http" => OracleBackend::Http,
            "openai" => OracleBackend::OpenAi,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ORACLE_BACKEND".to_string(),
                    format!("'{}' is not one of http, openai", other),
                ))
            }
        };
        let classifier_url = var_or("CLASSIFIER_URL", "http://localhost:5001/classify");
        let openai_api_key = lookup("OPENAI_API_KEY");
        if oracle_backend == OracleBackend::OpenAi && openai_api_key.is_none() {
            return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string()));
        }
        let oracle_model = var_or("ORACLE_MODEL", "gpt-4o-mini");
        let oracle_timeout = Duration::from_secs(parse_secs(&lookup, "ORACLE_TIMEOUT_SECS", 10)?);

        // --- Background work and CORS ---
        let janitor_interval = Duration::from_secs(parse_secs(&lookup, "JANITOR_INTERVAL_SECS", 30)?);
        let cors_origin_str = var_or("CORS_ORIGIN", "http://localhost:3000");
        let cors_origin = cors_origin_str.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            question_bank_path,
            oracle_backend,
            classifier_url,
            openai_api_key,
            oracle_model,
            oracle_timeout,
            janitor_interval,
            cors_origin,
        })
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.oracle_backend, OracleBackend::Http);
        assert_eq!(config.classifier_url, "http://localhost:5001/classify");
        assert_eq!(config.oracle_timeout, Duration::from_secs(10));
        assert_eq!(config.janitor_interval, Duration::from_secs(30));
        assert_eq!(config.cors_origin, "http://localhost:3000");
    }

    #[test]
    fn openai_backend_requires_a_key() {
        let err = load(&[("ORACLE_BACKEND", "openai")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "OPENAI_API_KEY"));

        let config = load(&[("ORACLE_BACKEND", "OpenAI"), ("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.oracle_backend, OracleBackend::OpenAi);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("ORACLE_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("ORACLE_BACKEND", "carrier-pigeon")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    fn blank_database_url_means_memory_store() {
        let config = load(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }
}
