//! services/api/src/bin/import_fallback.rs
//!
//! Copies every article of the file store into the relational store.
//! Re-running it is safe: URLs a user already has are skipped.

use api_lib::{
    config::{Config, ConfigError},
    error::ApiError,
    import::import_file,
    storage::connect_store,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- 2. Require the Relational Store ---
    if !config.database_configured() {
        return Err(ConfigError::MissingVar("DATABASE_URL".to_string()).into());
    }
    let store = connect_store(&config.storage_mode()).await?;

    // --- 3. Import ---
    info!("Reading file store at {}", config.data_path.display());
    let report = import_file(&config.data_path, store.as_ref()).await?;
    info!(
        "Imported {} articles, skipped {}",
        report.imported, report.skipped
    );
    Ok(())
}
