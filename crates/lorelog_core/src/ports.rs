//! crates/lorelog_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the core
//! depends on them only, never on a concrete database, file or HTTP client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Article, ArticlePatch, NewArticle, PageMetadata, Principal, StorageKind, Tag, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The collaborator is down or not configured (e.g. no API key).
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
    /// A unique constraint rejected a duplicate tag or association.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port
//=========================================================================================

/// The storage contract shared by the relational and the file-backed store.
///
/// Every article operation is scoped to `user_id`: an article owned by
/// another user behaves exactly like a missing one.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Cheap connectivity probe used by the health check.
    async fn ping(&self) -> PortResult<()>;

    // --- Users ---
    async fn ensure_user(&self, principal: &Principal) -> PortResult<User>;

    async fn upsert_user_by_email(&self, email: &str, name: Option<&str>) -> PortResult<User>;

    // --- Articles ---
    /// Newest `created_at` first.
    async fn list_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>>;

    async fn get_article(&self, user_id: Uuid, id: Uuid) -> PortResult<Article>;

    async fn find_article_by_url(&self, user_id: Uuid, url: &str) -> PortResult<Option<Article>>;

    async fn create_article(&self, user_id: Uuid, fields: NewArticle) -> PortResult<Article>;

    async fn update_article(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ArticlePatch,
    ) -> PortResult<Article>;

    /// Returns `false` when nothing owned by `user_id` had that id.
    async fn delete_article(&self, user_id: Uuid, id: Uuid) -> PortResult<bool>;

    /// Case-insensitive substring match over title, URL, summary and the
    /// space-joined tag names. Newest first.
    async fn search_articles_lexical(
        &self,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Article>>;

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> PortResult<Article> {
        let patch = ArticlePatch {
            read_at: Some(at),
            ..ArticlePatch::default()
        };
        self.update_article(user_id, id, patch).await
    }

    // --- Tags ---
    async fn article_tag_names(&self, user_id: Uuid, article_id: Uuid) -> PortResult<Vec<String>>;

    /// Insert-if-absent-else-fetch. Implementations that cannot do this
    /// atomically may surface `PortError::Conflict`; callers re-fetch.
    async fn get_or_create_tag(&self, name: &str) -> PortResult<Tag>;

    /// Fails with `PortError::Conflict` when the association already exists.
    async fn attach_tag(&self, user_id: Uuid, article_id: Uuid, tag: &Tag) -> PortResult<()>;

    /// Distinct tags attached to any of the user's articles.
    async fn user_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>>;

    /// Removes `tag` from the user's articles only. Returns the number of
    /// associations removed.
    async fn detach_tag_for_user(&self, user_id: Uuid, tag: &Tag) -> PortResult<usize>;

    /// Garbage-collects `tag` once no article references it. Returns `true`
    /// when the tag is gone afterwards.
    async fn delete_tag_if_unused(&self, tag: &Tag) -> PortResult<bool>;

    async fn count_user_associations(&self, user_id: Uuid) -> PortResult<usize>;

    /// Newest first.
    async fn list_untagged_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>>;

    async fn count_untagged_articles(&self, user_id: Uuid) -> PortResult<usize>;
}

//=========================================================================================
// Collaborator Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Converts text into a fixed-length vector. Returns
    /// `PortError::Unavailable` when no embedding backend is configured.
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetches title, summary and body length for a page. Implementations
    /// apply their own timeout.
    async fn fetch(&self, url: &str) -> PortResult<PageMetadata>;
}

#[async_trait]
pub trait InsightSummarizer: Send + Sync {
    /// Rewrites a bullet summary into a short prose paragraph.
    async fn summarize(&self, bullet_text: &str) -> PortResult<String>;
}
