//! crates/lorelog_core/src/tag_merge.rs
//!
//! Idempotently attaches a set of tag names to an article.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Tag, TagMergeOutcome};
use crate::ports::{ArticleStore, PortError, PortResult};
use crate::tags::normalize_tag;

/// Attaches `tag_names` to the article, creating missing tags.
///
/// Duplicate-key races (tag created or association attached by a concurrent
/// enrichment of the same article) are absorbed, so calling this twice with
/// the same names yields `added == 0` the second time.
pub async fn merge_tags(
    store: &dyn ArticleStore,
    user_id: Uuid,
    article_id: Uuid,
    tag_names: &[String],
) -> PortResult<TagMergeOutcome> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = tag_names
        .iter()
        .filter_map(|raw| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            let canonical = normalize_tag(trimmed);
            if canonical.is_none() {
                debug!(article_id = %article_id, tag = trimmed, "Dropping tag that does not normalize");
            }
            canonical
        })
        .filter(|name| seen.insert(name.clone()))
        .collect();

    let existing: HashSet<String> = store
        .article_tag_names(user_id, article_id)
        .await?
        .into_iter()
        .collect();
    let to_add: Vec<&String> = unique.iter().filter(|n| !existing.contains(*n)).collect();
    if to_add.is_empty() {
        return Ok(TagMergeOutcome {
            added: 0,
            total: existing.len(),
        });
    }

    let mut added = 0;
    for name in to_add {
        let tag = get_or_create(store, name).await?;
        match store.attach_tag(user_id, article_id, &tag).await {
            Ok(()) => added += 1,
            Err(PortError::Conflict(reason)) => {
                debug!(article_id = %article_id, tag = %tag.name, "Association already present: {}", reason);
            }
            Err(e) => return Err(e),
        }
    }

    let total = store.article_tag_names(user_id, article_id).await?.len();
    Ok(TagMergeOutcome { added, total })
}

/// A creation conflict means another writer won the race; fetch again.
async fn get_or_create(store: &dyn ArticleStore, name: &str) -> PortResult<Tag> {
    match store.get_or_create_tag(name).await {
        Err(PortError::Conflict(reason)) => {
            debug!(tag = name, "Tag created concurrently, re-fetching: {}", reason);
            store.get_or_create_tag(name).await
        }
        other => other,
    }
}
