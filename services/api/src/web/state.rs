//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lorelog_core::ports::{ArticleStore, Embedder, InsightSummarizer, MetadataFetcher};
use lorelog_core::{IngestionPipeline, InsightsService, SearchConfig, SearchService, TagMaintenance};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ArticleStore>,
    pub pipeline: Arc<IngestionPipeline>,
    pub search: Arc<SearchService>,
    pub insights: Arc<InsightsService>,
    pub maintenance: Arc<TagMaintenance>,
}

impl AppState {
    /// Wires the core services around one store and the collaborator adapters.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn MetadataFetcher>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn InsightSummarizer>,
    ) -> Self {
        Self {
            pipeline: Arc::new(IngestionPipeline::new(
                store.clone(),
                fetcher,
                embedder.clone(),
            )),
            search: Arc::new(SearchService::new(
                store.clone(),
                embedder,
                SearchConfig::default(),
            )),
            insights: Arc::new(InsightsService::new(store.clone(), summarizer)),
            maintenance: Arc::new(TagMaintenance::new(store.clone())),
            store,
            config,
        }
    }
}
