pub mod domain;
pub mod error;
pub mod ingestion;
pub mod insights;
pub mod maintenance;
pub mod ports;
pub mod search;
pub mod similarity;
pub mod tag_merge;
pub mod tags;

#[cfg(test)]
mod testing;

pub use domain::{
    Article, ArticlePatch, NewArticle, PageMetadata, Principal, StorageKind, Tag, TagMergeOutcome,
    User,
};
pub use error::{CoreError, CoreResult};
pub use ingestion::{EnrichmentState, IngestMode, IngestOutcome, IngestionPipeline, StepOutcome};
pub use insights::{InsightStats, InsightsService, WeeklyInsight};
pub use maintenance::{AutoTagReport, CleanupReport, TagMaintenance};
pub use ports::{
    ArticleStore, Embedder, InsightSummarizer, MetadataFetcher, PortError, PortResult,
};
pub use search::{SearchConfig, SearchResults, SearchService, SearchStrategy};
