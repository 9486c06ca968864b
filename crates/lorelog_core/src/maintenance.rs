//! crates/lorelog_core/src/maintenance.rs
//!
//! Bulk tag upkeep: backfilling tags onto untagged articles and removing
//! tags that fail the noise filter.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::ports::ArticleStore;
use crate::tag_merge::merge_tags;
use crate::tags::{extract_article_tags, is_noisy_tag, TagSource};

/// Untagged articles processed per backfill call.
pub const AUTO_TAG_BATCH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoTagReport {
    pub processed: usize,
    pub added_tags: usize,
    /// Articles still without tags afterwards.
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    /// Associations removed from the user's articles.
    pub removed: usize,
    /// Associations the user's articles still hold.
    pub remaining: usize,
}

pub struct TagMaintenance {
    store: Arc<dyn ArticleStore>,
}

impl TagMaintenance {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn auto_tag(&self, user_id: Uuid) -> CoreResult<AutoTagReport> {
        let targets = self
            .store
            .list_untagged_articles(user_id, AUTO_TAG_BATCH)
            .await?;

        let mut report = AutoTagReport::default();
        for article in &targets {
            let names = extract_article_tags(TagSource {
                title: &article.title,
                summary: article.summary.as_deref(),
                url: &article.url,
            });
            let outcome = merge_tags(self.store.as_ref(), user_id, article.id, &names).await?;
            report.processed += 1;
            report.added_tags += outcome.added;
        }

        report.remaining = self.store.count_untagged_articles(user_id).await?;
        info!(
            user_id = %user_id,
            processed = report.processed,
            added = report.added_tags,
            remaining = report.remaining,
            "Auto-tagging finished"
        );
        Ok(report)
    }

    /// Detaches noisy tags from the user's articles only; a tag is deleted
    /// once nothing references it.
    pub async fn cleanup_tags(&self, user_id: Uuid) -> CoreResult<CleanupReport> {
        let tags = self.store.user_tags(user_id).await?;

        let mut removed = 0;
        for tag in tags.iter().filter(|t| is_noisy_tag(&t.name)) {
            removed += self.store.detach_tag_for_user(user_id, tag).await?;
            if let Err(e) = self.store.delete_tag_if_unused(tag).await {
                warn!(tag = %tag.name, "Could not garbage-collect tag: {}", e);
            }
        }

        let remaining = self.store.count_user_associations(user_id).await?;
        info!(user_id = %user_id, removed, remaining, "Tag cleanup finished");
        Ok(CleanupReport { removed, remaining })
    }
}
