//! services/api/src/adapters/file_store.rs
//!
//! The development fallback: every article lives in one JSON document,
//! loaded in full per operation and replaced atomically on write
//! (write `<path>.tmp`, then rename over `<path>`).
//!
//! Tags are stored by name on each article. A tag's id is derived from its
//! name, so the same name always maps to the same `Tag`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lorelog_core::domain::{
    Article, ArticlePatch, NewArticle, Principal, StorageKind, Tag, User,
};
use lorelog_core::ports::{ArticleStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const DOCUMENT_VERSION: u32 = 1;

//=========================================================================================
// On-disk Shape
//=========================================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    #[serde(default)]
    pub articles: Vec<StoredArticle>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            articles: Vec::new(),
        }
    }
}

/// One article as persisted. Older documents used `userId`, `userEmail`
/// and `userName`; those keys are still accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArticle {
    pub id: Uuid,
    #[serde(alias = "userId")]
    pub owner_id: Uuid,
    #[serde(default, alias = "userEmail")]
    pub owner_email: Option<String>,
    #[serde(default, alias = "userName")]
    pub owner_name: Option<String>,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub body_length: Option<u32>,
    #[serde(default)]
    pub embedding: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredArticle {
    fn to_domain(&self) -> Article {
        Article {
            id: self.id,
            owner_id: self.owner_id,
            url: self.url.clone(),
            title: self.title.clone(),
            summary: self.summary.clone(),
            body_length: self.body_length,
            embedding: self.embedding.clone(),
            tags: self.tags.clone(),
            read_at: self.read_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.url.to_lowercase().contains(needle)
            || self
                .summary
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(needle)
            || self.tags.join(" ").to_lowercase().contains(needle)
    }
}

/// Reads a document, treating a missing file as an empty store.
pub async fn read_document(path: &Path) -> PortResult<StoreDocument> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
            PortError::Storage(format!("{} is not a valid store document: {}", path.display(), e))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
        Err(e) => Err(PortError::Storage(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_document(path: &Path, document: &StoreDocument) -> PortResult<()> {
    let storage_err = |e: std::io::Error| {
        PortError::Storage(format!("failed to write {}: {}", path.display(), e))
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(storage_err)?;
    }
    let body = serde_json::to_vec_pretty(document)
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let temp = temp_path(path);
    if let Err(e) = tokio::fs::write(&temp, body).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(storage_err(e));
    }
    tokio::fs::rename(&temp, path).await.map_err(storage_err)
}

/// Stable id for a tag name.
pub fn tag_id(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("lorelog/tag/{}", name).as_bytes())
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Article {} not found", id))
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// JSON-file implementation of `ArticleStore`. Single process only: the
/// mutex serializes read-modify-write cycles within this process, nothing
/// protects against a second writer.
pub struct FileArticleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileArticleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreDocument) -> PortResult<T>) -> PortResult<T> {
        let _guard = self.lock.lock().await;
        let document = read_document(&self.path).await?;
        f(&document)
    }

    /// Applies `f` and persists the document when it reports a change.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> PortResult<(T, bool)>,
    ) -> PortResult<T> {
        let _guard = self.lock.lock().await;
        let mut document = read_document(&self.path).await?;
        let (value, changed) = f(&mut document)?;
        if changed {
            document.version = DOCUMENT_VERSION;
            write_document(&self.path, &document).await?;
            debug!(path = %self.path.display(), articles = document.articles.len(), "Store document written");
        }
        Ok(value)
    }
}

fn owned(document: &StoreDocument, user_id: Uuid) -> Vec<&StoredArticle> {
    let mut articles: Vec<&StoredArticle> = document
        .articles
        .iter()
        .filter(|a| a.owner_id == user_id)
        .collect();
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    articles
}

fn owned_mut(document: &mut StoreDocument, user_id: Uuid, id: Uuid) -> PortResult<&mut StoredArticle> {
    document
        .articles
        .iter_mut()
        .find(|a| a.owner_id == user_id && a.id == id)
        .ok_or_else(|| not_found(id))
}

//=========================================================================================
// `ArticleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArticleStore for FileArticleStore {
    fn kind(&self) -> StorageKind {
        StorageKind::File
    }

    async fn ping(&self) -> PortResult<()> {
        self.read(|_| Ok(())).await
    }

    // --- Users ---

    async fn ensure_user(&self, principal: &Principal) -> PortResult<User> {
        let email = principal.email.as_ref().map(|e| e.to_lowercase());
        let name = principal.name.clone();
        let user_id = principal.user_id;

        self.mutate(|document| {
            let mut changed = false;
            // Articles imported for this email belong to the caller from now on.
            if let Some(imported) = email.as_deref().map(User::imported_id) {
                if imported != user_id {
                    for article in document.articles.iter_mut().filter(|a| a.owner_id == imported) {
                        article.owner_id = user_id;
                        changed = true;
                    }
                }
            }
            let mut user = User {
                id: user_id,
                email: None,
                name: None,
                invite_accepted_at: None,
            };
            for article in document.articles.iter_mut().filter(|a| a.owner_id == user_id) {
                if email.is_some() && article.owner_email != email {
                    article.owner_email = email.clone();
                    changed = true;
                }
                if name.is_some() && article.owner_name != name {
                    article.owner_name = name.clone();
                    changed = true;
                }
                user.email = user.email.or_else(|| article.owner_email.clone());
                user.name = user.name.or_else(|| article.owner_name.clone());
            }
            user.email = email.clone().or(user.email);
            user.name = name.clone().or(user.name);
            Ok((user, changed))
        })
        .await
    }

    async fn upsert_user_by_email(&self, email: &str, name: Option<&str>) -> PortResult<User> {
        let email = email.to_lowercase();
        self.read(|document| {
            let existing = document
                .articles
                .iter()
                .find(|a| a.owner_email.as_deref() == Some(email.as_str()));
            Ok(User {
                id: existing.map_or_else(|| User::imported_id(&email), |a| a.owner_id),
                email: Some(email.clone()),
                name: name
                    .map(str::to_string)
                    .or_else(|| existing.and_then(|a| a.owner_name.clone())),
                invite_accepted_at: None,
            })
        })
        .await
    }

    // --- Articles ---

    async fn list_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        self.read(|document| {
            Ok(owned(document, user_id)
                .into_iter()
                .take(limit)
                .map(StoredArticle::to_domain)
                .collect())
        })
        .await
    }

    async fn get_article(&self, user_id: Uuid, id: Uuid) -> PortResult<Article> {
        self.read(|document| {
            document
                .articles
                .iter()
                .find(|a| a.owner_id == user_id && a.id == id)
                .map(StoredArticle::to_domain)
                .ok_or_else(|| not_found(id))
        })
        .await
    }

    async fn find_article_by_url(&self, user_id: Uuid, url: &str) -> PortResult<Option<Article>> {
        self.read(|document| {
            Ok(owned(document, user_id)
                .into_iter()
                .find(|a| a.url == url)
                .map(StoredArticle::to_domain))
        })
        .await
    }

    async fn create_article(&self, user_id: Uuid, fields: NewArticle) -> PortResult<Article> {
        let now = Utc::now();
        let stored = StoredArticle {
            id: Uuid::new_v4(),
            owner_id: user_id,
            owner_email: fields.owner_email.map(|e| e.to_lowercase()),
            owner_name: fields.owner_name,
            url: fields.url,
            title: fields.title,
            summary: fields.summary,
            body_length: fields.body_length,
            embedding: fields.embedding,
            tags: Vec::new(),
            read_at: fields.read_at,
            created_at: fields.created_at.unwrap_or(now),
            updated_at: now,
        };
        let article = stored.to_domain();

        self.mutate(move |document| {
            document.articles.insert(0, stored);
            Ok(((), true))
        })
        .await?;
        Ok(article)
    }

    async fn update_article(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ArticlePatch,
    ) -> PortResult<Article> {
        self.mutate(|document| {
            let article = owned_mut(document, user_id, id)?;
            if let Some(title) = patch.title {
                article.title = title;
            }
            if let Some(summary) = patch.summary {
                article.summary = Some(summary);
            }
            if let Some(body_length) = patch.body_length {
                article.body_length = Some(body_length);
            }
            if let Some(embedding) = patch.embedding {
                article.embedding = Some(embedding);
            }
            if let Some(read_at) = patch.read_at {
                article.read_at = Some(read_at);
            }
            article.updated_at = Utc::now();
            Ok((article.to_domain(), true))
        })
        .await
    }

    async fn delete_article(&self, user_id: Uuid, id: Uuid) -> PortResult<bool> {
        self.mutate(|document| {
            let before = document.articles.len();
            document
                .articles
                .retain(|a| !(a.owner_id == user_id && a.id == id));
            let deleted = document.articles.len() != before;
            Ok((deleted, deleted))
        })
        .await
    }

    async fn search_articles_lexical(
        &self,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Article>> {
        let needle = query.to_lowercase();
        self.read(|document| {
            Ok(owned(document, user_id)
                .into_iter()
                .filter(|a| a.matches(&needle))
                .take(limit)
                .map(StoredArticle::to_domain)
                .collect())
        })
        .await
    }

    // --- Tags ---

    async fn article_tag_names(&self, user_id: Uuid, article_id: Uuid) -> PortResult<Vec<String>> {
        self.read(|document| {
            document
                .articles
                .iter()
                .find(|a| a.owner_id == user_id && a.id == article_id)
                .map(|a| a.tags.clone())
                .ok_or_else(|| not_found(article_id))
        })
        .await
    }

    async fn get_or_create_tag(&self, name: &str) -> PortResult<Tag> {
        // Names are the identity here; nothing to persist until attached.
        Ok(Tag {
            id: tag_id(name),
            name: name.to_string(),
        })
    }

    async fn attach_tag(&self, user_id: Uuid, article_id: Uuid, tag: &Tag) -> PortResult<()> {
        self.mutate(|document| {
            let article = owned_mut(document, user_id, article_id)?;
            if article.tags.iter().any(|t| *t == tag.name) {
                return Err(PortError::Conflict(format!(
                    "tag {} already attached to {}",
                    tag.name, article_id
                )));
            }
            article.tags.push(tag.name.clone());
            article.updated_at = Utc::now();
            Ok(((), true))
        })
        .await
    }

    async fn user_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>> {
        self.read(|document| {
            let mut tags: Vec<Tag> = Vec::new();
            for article in owned(document, user_id) {
                for name in &article.tags {
                    if !tags.iter().any(|t| t.name == *name) {
                        tags.push(Tag {
                            id: tag_id(name),
                            name: name.clone(),
                        });
                    }
                }
            }
            Ok(tags)
        })
        .await
    }

    async fn detach_tag_for_user(&self, user_id: Uuid, tag: &Tag) -> PortResult<usize> {
        self.mutate(|document| {
            let mut removed = 0;
            for article in document.articles.iter_mut().filter(|a| a.owner_id == user_id) {
                let before = article.tags.len();
                article.tags.retain(|t| *t != tag.name);
                removed += before - article.tags.len();
            }
            Ok((removed, removed > 0))
        })
        .await
    }

    async fn delete_tag_if_unused(&self, tag: &Tag) -> PortResult<bool> {
        // A tag exists only while some article carries its name.
        self.read(|document| {
            Ok(!document
                .articles
                .iter()
                .any(|a| a.tags.iter().any(|t| *t == tag.name)))
        })
        .await
    }

    async fn count_user_associations(&self, user_id: Uuid) -> PortResult<usize> {
        self.read(|document| {
            Ok(document
                .articles
                .iter()
                .filter(|a| a.owner_id == user_id)
                .map(|a| a.tags.len())
                .sum())
        })
        .await
    }

    async fn list_untagged_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        self.read(|document| {
            Ok(owned(document, user_id)
                .into_iter()
                .filter(|a| a.tags.is_empty())
                .take(limit)
                .map(StoredArticle::to_domain)
                .collect())
        })
        .await
    }

    async fn count_untagged_articles(&self, user_id: Uuid) -> PortResult<usize> {
        self.read(|document| {
            Ok(document
                .articles
                .iter()
                .filter(|a| a.owner_id == user_id && a.tags.is_empty())
                .count())
        })
        .await
    }
}
