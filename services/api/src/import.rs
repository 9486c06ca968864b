//! services/api/src/import.rs
//!
//! One-shot migration of a file-store document into another store,
//! normally the relational one. Safe to re-run: articles whose URL the
//! owner already has are skipped.

use crate::adapters::file_store::{read_document, StoreDocument, StoredArticle};
use lorelog_core::domain::NewArticle;
use lorelog_core::ports::{ArticleStore, PortResult};
use lorelog_core::tag_merge::merge_tags;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Reads the document at `path` and imports it into `target`.
pub async fn import_file(path: &Path, target: &dyn ArticleStore) -> PortResult<ImportReport> {
    let document = read_document(path).await?;
    info!(
        "Importing {} articles from {}",
        document.articles.len(),
        path.display()
    );
    import_document(&document, target).await
}

pub async fn import_document(
    document: &StoreDocument,
    target: &dyn ArticleStore,
) -> PortResult<ImportReport> {
    let mut report = ImportReport::default();

    for stored in &document.articles {
        let Some(email) = importable_owner(stored) else {
            debug!(article_id = %stored.id, "Skipping article without url, title or owner email");
            report.skipped += 1;
            continue;
        };

        let user = target
            .upsert_user_by_email(&email, stored.owner_name.as_deref())
            .await?;

        if target.find_article_by_url(user.id, &stored.url).await?.is_some() {
            debug!(user_id = %user.id, url = %stored.url, "Article already imported");
            report.skipped += 1;
            continue;
        }

        let fields = NewArticle {
            url: stored.url.clone(),
            title: stored.title.clone(),
            summary: stored.summary.clone(),
            body_length: stored.body_length,
            embedding: stored.embedding.clone(),
            read_at: stored.read_at,
            created_at: Some(stored.created_at),
            owner_email: Some(email),
            owner_name: stored.owner_name.clone(),
        };
        let article = target.create_article(user.id, fields).await?;

        if !stored.tags.is_empty() {
            merge_tags(target, user.id, article.id, &stored.tags).await?;
        }
        report.imported += 1;
    }

    info!(
        "Import finished: {} imported, {} skipped",
        report.imported, report.skipped
    );
    Ok(report)
}

/// The lowercased owner email, if the entry carries everything an import needs.
fn importable_owner(stored: &StoredArticle) -> Option<String> {
    if stored.url.trim().is_empty() || stored.title.trim().is_empty() {
        return None;
    }
    stored
        .owner_email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}
