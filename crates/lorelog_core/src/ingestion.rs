//! crates/lorelog_core/src/ingestion.rs
//!
//! The two-phase save: a fast insert that never waits on the network, then a
//! best-effort enrichment (metadata, embedding, tags) that never regresses
//! data already stored.

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::{Article, ArticlePatch, NewArticle, PageMetadata, Principal, TagMergeOutcome};
use crate::error::{CoreError, CoreResult};
use crate::ports::{ArticleStore, Embedder, MetadataFetcher, PortError};
use crate::similarity::serialize_embedding;
use crate::tag_merge::merge_tags;
use crate::tags::{extract_article_tags, TagSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Insert and return immediately; enrichment is triggered separately.
    Fast,
    /// Insert, then enrich inline before returning.
    Full,
}

/// Lifecycle of an article with respect to enrichment.
///
/// `EnrichFailed` is retryable by calling [`IngestionPipeline::enrich`] again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    Created,
    Enriching,
    Enriched,
    EnrichFailed,
}

/// Result of one enrichment sub-step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Obtained(T),
    /// The collaborator is not configured or down; a defined fallback applies.
    Unavailable(String),
    Failed(String),
}

impl<T> StepOutcome<T> {
    fn from_port(result: Result<T, PortError>) -> Self {
        match result {
            Ok(value) => StepOutcome::Obtained(value),
            Err(PortError::Unavailable(reason)) => StepOutcome::Unavailable(reason),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    fn as_obtained(&self) -> Option<&T> {
        match self {
            StepOutcome::Obtained(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    fn erase(&self) -> StepOutcome<()> {
        match self {
            StepOutcome::Obtained(_) => StepOutcome::Obtained(()),
            StepOutcome::Unavailable(r) => StepOutcome::Unavailable(r.clone()),
            StepOutcome::Failed(r) => StepOutcome::Failed(r.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentReport {
    pub metadata: StepOutcome<()>,
    pub embedding: StepOutcome<()>,
    pub tagging: StepOutcome<TagMergeOutcome>,
}

impl EnrichmentReport {
    pub fn state(&self) -> EnrichmentState {
        if self.metadata.is_failed() || self.embedding.is_failed() || self.tagging.is_failed() {
            EnrichmentState::EnrichFailed
        } else {
            EnrichmentState::Enriched
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub article: Article,
    pub state: EnrichmentState,
    /// `None` for a fast-path create.
    pub report: Option<EnrichmentReport>,
}

pub struct IngestionPipeline {
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<dyn MetadataFetcher>,
    embedder: Arc<dyn Embedder>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn MetadataFetcher>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            store,
            fetcher,
            embedder,
        }
    }

    /// Saves `raw_url` for the caller. Succeeds whenever storage is reachable,
    /// whatever happens to enrichment.
    pub async fn ingest(
        &self,
        principal: &Principal,
        raw_url: &str,
        mode: IngestMode,
    ) -> CoreResult<IngestOutcome> {
        let url = validate_url(raw_url)?;

        self.store.ensure_user(principal).await?;
        let article = self
            .store
            .create_article(
                principal.user_id,
                NewArticle {
                    title: provisional_title(&url),
                    url: url.to_string(),
                    owner_email: principal.email.clone(),
                    owner_name: principal.name.clone(),
                    ..NewArticle::default()
                },
            )
            .await?;
        info!(article_id = %article.id, user_id = %principal.user_id, "Article created");

        match mode {
            IngestMode::Fast => Ok(IngestOutcome {
                article,
                state: EnrichmentState::Created,
                report: None,
            }),
            IngestMode::Full => self.enrich(principal.user_id, article.id).await,
        }
    }

    /// Fetches metadata, embeds and tags an existing article. Sub-step
    /// failures are logged and leave the previous values in place; only
    /// storage failures reach the caller.
    pub async fn enrich(&self, user_id: Uuid, article_id: Uuid) -> CoreResult<IngestOutcome> {
        let article = self.store.get_article(user_id, article_id).await?;
        debug!(article_id = %article_id, state = ?EnrichmentState::Enriching, "Enrichment started");

        let metadata = StepOutcome::from_port(self.fetcher.fetch(&article.url).await);
        let mut patch = ArticlePatch::default();
        match &metadata {
            StepOutcome::Obtained(meta) => apply_metadata(&article, meta, &mut patch),
            StepOutcome::Unavailable(reason) | StepOutcome::Failed(reason) => {
                warn!(article_id = %article_id, "Metadata fetch failed, keeping stored fields: {}", reason);
            }
        }

        let title = patch.title.as_deref().unwrap_or(&article.title);
        let embedding = self.embed(&format!("{} {}", title, article.url)).await;
        match &embedding {
            StepOutcome::Obtained(vector) => patch.embedding = Some(serialize_embedding(vector)),
            StepOutcome::Unavailable(reason) => {
                debug!(article_id = %article_id, "Embedding unavailable: {}", reason);
            }
            StepOutcome::Failed(reason) => {
                warn!(article_id = %article_id, "Embedding failed, keeping stored vector: {}", reason);
            }
        }

        let article = if patch.is_empty() {
            article
        } else {
            self.store.update_article(user_id, article_id, patch).await?
        };

        let tagging = self.tag(&article).await;
        let article = self.store.get_article(user_id, article_id).await?;

        let report = EnrichmentReport {
            metadata: metadata.erase(),
            embedding: embedding.erase(),
            tagging,
        };
        let state = report.state();
        info!(article_id = %article_id, state = ?state, tags = article.tags.len(), "Enrichment finished");

        Ok(IngestOutcome {
            article,
            state,
            report: Some(report),
        })
    }

    async fn embed(&self, text: &str) -> StepOutcome<Vec<f32>> {
        match StepOutcome::from_port(self.embedder.embed(text).await) {
            StepOutcome::Obtained(v) if v.is_empty() => {
                StepOutcome::Failed("embedding backend returned an empty vector".to_string())
            }
            other => other,
        }
    }

    async fn tag(&self, article: &Article) -> StepOutcome<TagMergeOutcome> {
        let names = extract_article_tags(TagSource {
            title: &article.title,
            summary: article.summary.as_deref(),
            url: &article.url,
        });
        let outcome = StepOutcome::from_port(
            merge_tags(self.store.as_ref(), article.owner_id, article.id, &names).await,
        );
        if let StepOutcome::Failed(reason) = &outcome {
            warn!(article_id = %article.id, "Auto-tagging failed: {}", reason);
        }
        if let Some(merged) = outcome.as_obtained() {
            debug!(article_id = %article.id, added = merged.added, total = merged.total, "Tags merged");
        }
        outcome
    }
}

/// Only overwrite a field when the fetch produced something better than
/// what is stored.
fn apply_metadata(article: &Article, meta: &PageMetadata, patch: &mut ArticlePatch) {
    if let Some(title) = meta.title.as_deref().map(str::trim) {
        if !title.is_empty() && title != article.url {
            patch.title = Some(title.to_string());
        }
    }
    if let Some(summary) = meta.summary.as_deref().map(str::trim) {
        if !summary.is_empty() {
            patch.summary = Some(summary.to_string());
        }
    }
    if meta.body_length > 0 {
        patch.body_length = Some(meta.body_length);
    }
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> CoreResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("url is required".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| CoreError::Validation(format!("invalid url '{}': {}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(CoreError::Validation(format!(
            "url must be an http(s) address: {}",
            trimmed
        )));
    }
    Ok(url)
}

/// Hostname without a leading `www.`, falling back to the whole URL.
pub fn provisional_title(url: &Url) -> String {
    url.host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host))
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}
