//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
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

/// Deployment mode. Production never runs on the file store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Which storage backend the process uses, decided once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageMode {
    Database { url: String },
    File { path: PathBuf },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub environment: Environment,
    pub database_url: Option<String>,
    pub data_path: PathBuf,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub embed_model: String,
    pub summary_model: String,
    pub fetch_timeout: Duration,
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

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Load Server and Storage Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let environment = match var("LORELOG_ENV")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "development" | "dev" | "test" => Environment::Development,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LORELOG_ENV".to_string(),
                    format!("'{}' is not one of development, production", other),
                ))
            }
        };

        // A blank DATABASE_URL counts as unset.
        let database_url = non_blank(var("DATABASE_URL"));
        if environment == Environment::Production && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let data_path = non_blank(var("LORELOG_DATA_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".local-data/articles.json"));

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = non_blank(var("OPENAI_API_KEY"));

        // --- Load Adapter-specific Settings ---
        let embed_model =
            var("LORELOG_EMBED_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string());
        let summary_model =
            var("LORELOG_SUMMARY_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let fetch_timeout_str = var("FETCH_TIMEOUT_SECS").unwrap_or_else(|| "15".to_string());
        let fetch_timeout = fetch_timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "FETCH_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", fetch_timeout_str),
                )
            })?;

        Ok(Self {
            bind_address,
            environment,
            database_url,
            data_path,
            log_level,
            openai_api_key,
            embed_model,
            summary_model,
            fetch_timeout,
        })
    }

    /// The file store is only ever selected outside production.
    pub fn storage_mode(&self) -> StorageMode {
        match (&self.database_url, self.environment) {
            (Some(url), _) => StorageMode::Database { url: url.clone() },
            (None, Environment::Development) => StorageMode::File {
                path: self.data_path.clone(),
            },
            // `from_lookup` rejects this combination; keep the database
            // mode so a hand-built config still fails loudly on connect.
            (None, Environment::Production) => StorageMode::Database { url: String::new() },
        }
    }

    pub fn database_configured(&self) -> bool {
        self.database_url.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
