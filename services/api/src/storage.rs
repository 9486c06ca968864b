//! services/api/src/storage.rs
//!
//! The storage factory. Turns the `StorageMode` resolved at startup into the
//! one `ArticleStore` the whole process shares.

use crate::adapters::{DbAdapter, FileArticleStore};
use crate::config::StorageMode;
use crate::error::ApiError;
use lorelog_core::ports::ArticleStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_DB_CONNECTIONS: u32 = 5;

/// Connects the configured backend. The relational store has its
/// migrations applied before it is handed out.
pub async fn connect_store(mode: &StorageMode) -> Result<Arc<dyn ArticleStore>, ApiError> {
    match mode {
        StorageMode::Database { url } => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(url)
                .await?;
            let adapter = DbAdapter::new(pool);
            info!("Running database migrations...");
            adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Arc::new(adapter))
        }
        StorageMode::File { path } => {
            warn!(
                "DATABASE_URL is not set; using the file store at {}. Not for production use.",
                path.display()
            );
            Ok(Arc::new(FileArticleStore::new(path.clone())))
        }
    }
}
