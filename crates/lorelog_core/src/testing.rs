//! In-memory fakes of every port, for exercising the core without I/O.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::domain::{
    Article, ArticlePatch, NewArticle, PageMetadata, Principal, StorageKind, Tag, User,
};
use crate::ports::{
    ArticleStore, Embedder, InsightSummarizer, MetadataFetcher, PortError, PortResult,
};

//=========================================================================================
// MemoryStore
//=========================================================================================

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// Articles in insertion order; `tags` is rebuilt on read.
    articles: Vec<Article>,
    tags: HashMap<Uuid, Tag>,
    /// (article_id, tag_id) in attach order.
    associations: Vec<(Uuid, Uuid)>,
}

/// Relational-shaped store backed by plain collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    offline: Arc<AtomicBool>,
    tag_conflicts: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails with `PortError::Storage`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The next `n` calls to `get_or_create_tag` report a creation conflict,
    /// as if another writer inserted the tag first.
    pub fn inject_tag_conflicts(&self, n: usize) {
        self.tag_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn tag_count(&self) -> usize {
        self.state.read().unwrap().tags.len()
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Storage("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl MemoryState {
    fn hydrate(&self, article: &Article) -> Article {
        let mut out = article.clone();
        out.tags = self.tag_names(article.id);
        out
    }

    fn tag_names(&self, article_id: Uuid) -> Vec<String> {
        self.associations
            .iter()
            .filter(|(a, _)| *a == article_id)
            .filter_map(|(_, t)| self.tags.get(t).map(|tag| tag.name.clone()))
            .collect()
    }

    fn owned(&self, user_id: Uuid) -> Vec<Article> {
        let mut owned: Vec<(usize, Article)> = self
            .articles
            .iter()
            .enumerate()
            .filter(|(_, a)| a.owner_id == user_id)
            .map(|(i, a)| (i, self.hydrate(a)))
            .collect();
        owned.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        owned.into_iter().map(|(_, a)| a).collect()
    }

    fn position(&self, user_id: Uuid, id: Uuid) -> PortResult<usize> {
        self.articles
            .iter()
            .position(|a| a.owner_id == user_id && a.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", id)))
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Database
    }

    async fn ping(&self) -> PortResult<()> {
        self.check_online()
    }

    async fn ensure_user(&self, principal: &Principal) -> PortResult<User> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        let user = state.users.entry(principal.user_id).or_insert_with(|| User {
            id: principal.user_id,
            email: None,
            name: None,
            invite_accepted_at: None,
        });
        if let Some(email) = &principal.email {
            user.email = Some(email.to_lowercase());
        }
        if principal.name.is_some() {
            user.name = principal.name.clone();
        }
        Ok(user.clone())
    }

    async fn upsert_user_by_email(&self, email: &str, name: Option<&str>) -> PortResult<User> {
        self.check_online()?;
        let email = email.to_lowercase();
        let mut state = self.state.write().unwrap();
        let existing = state
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email.as_str()))
            .map(|u| u.id);
        let id = existing.unwrap_or_else(Uuid::new_v4);
        let user = state.users.entry(id).or_insert_with(|| User {
            id,
            email: Some(email.clone()),
            name: None,
            invite_accepted_at: Some(Utc::now()),
        });
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        Ok(user.clone())
    }

    async fn list_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        Ok(state.owned(user_id).into_iter().take(limit).collect())
    }

    async fn get_article(&self, user_id: Uuid, id: Uuid) -> PortResult<Article> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        let idx = state.position(user_id, id)?;
        Ok(state.hydrate(&state.articles[idx]))
    }

    async fn find_article_by_url(&self, user_id: Uuid, url: &str) -> PortResult<Option<Article>> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        Ok(state.owned(user_id).into_iter().find(|a| a.url == url))
    }

    async fn create_article(&self, user_id: Uuid, fields: NewArticle) -> PortResult<Article> {
        self.check_online()?;
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            owner_id: user_id,
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
        self.state.write().unwrap().articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ArticlePatch,
    ) -> PortResult<Article> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        let idx = state.position(user_id, id)?;
        let article = &mut state.articles[idx];
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
        let updated = state.articles[idx].clone();
        Ok(state.hydrate(&updated))
    }

    async fn delete_article(&self, user_id: Uuid, id: Uuid) -> PortResult<bool> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        let Ok(idx) = state.position(user_id, id) else {
            return Ok(false);
        };
        state.articles.remove(idx);
        state.associations.retain(|(a, _)| *a != id);
        Ok(true)
    }

    async fn search_articles_lexical(
        &self,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Article>> {
        self.check_online()?;
        let q = query.to_lowercase();
        let state = self.state.read().unwrap();
        Ok(state
            .owned(user_id)
            .into_iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&q)
                    || a.url.to_lowercase().contains(&q)
                    || a.summary.as_deref().unwrap_or("").to_lowercase().contains(&q)
                    || a.tags.join(" ").to_lowercase().contains(&q)
            })
            .take(limit)
            .collect())
    }

    async fn article_tag_names(&self, user_id: Uuid, article_id: Uuid) -> PortResult<Vec<String>> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        state.position(user_id, article_id)?;
        Ok(state.tag_names(article_id))
    }

    async fn get_or_create_tag(&self, name: &str) -> PortResult<Tag> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        let pending = self.tag_conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.tag_conflicts.store(pending - 1, Ordering::SeqCst);
            if !state.tags.values().any(|t| t.name == name) {
                let tag = Tag {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                };
                state.tags.insert(tag.id, tag);
            }
            return Err(PortError::Conflict(format!("tag {} already exists", name)));
        }
        if let Some(tag) = state.tags.values().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn attach_tag(&self, user_id: Uuid, article_id: Uuid, tag: &Tag) -> PortResult<()> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        state.position(user_id, article_id)?;
        if state.associations.contains(&(article_id, tag.id)) {
            return Err(PortError::Conflict(format!(
                "tag {} already attached to {}",
                tag.name, article_id
            )));
        }
        state.associations.push((article_id, tag.id));
        Ok(())
    }

    async fn user_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        let mut out: Vec<Tag> = Vec::new();
        for article in state.articles.iter().filter(|a| a.owner_id == user_id) {
            for (_, tag_id) in state.associations.iter().filter(|(a, _)| *a == article.id) {
                if let Some(tag) = state.tags.get(tag_id) {
                    if !out.contains(tag) {
                        out.push(tag.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    async fn detach_tag_for_user(&self, user_id: Uuid, tag: &Tag) -> PortResult<usize> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        let owned: Vec<Uuid> = state
            .articles
            .iter()
            .filter(|a| a.owner_id == user_id)
            .map(|a| a.id)
            .collect();
        let before = state.associations.len();
        state
            .associations
            .retain(|(a, t)| !(*t == tag.id && owned.contains(a)));
        Ok(before - state.associations.len())
    }

    async fn delete_tag_if_unused(&self, tag: &Tag) -> PortResult<bool> {
        self.check_online()?;
        let mut state = self.state.write().unwrap();
        if state.associations.iter().any(|(_, t)| *t == tag.id) {
            return Ok(false);
        }
        state.tags.remove(&tag.id);
        Ok(true)
    }

    async fn count_user_associations(&self, user_id: Uuid) -> PortResult<usize> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        Ok(state
            .owned(user_id)
            .iter()
            .map(|a| a.tags.len())
            .sum())
    }

    async fn list_untagged_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        Ok(state
            .owned(user_id)
            .into_iter()
            .filter(|a| a.tags.is_empty())
            .take(limit)
            .collect())
    }

    async fn count_untagged_articles(&self, user_id: Uuid) -> PortResult<usize> {
        self.check_online()?;
        let state = self.state.read().unwrap();
        Ok(state.owned(user_id).iter().filter(|a| a.tags.is_empty()).count())
    }
}

//=========================================================================================
// Collaborator mocks
//=========================================================================================

#[derive(Clone)]
enum EmbedBehavior {
    Fixed(Vec<f32>),
    /// First keyword contained in the (lowercased) text wins.
    Keyed(Vec<(String, Vec<f32>)>, Vec<f32>),
    Unavailable,
    Failing,
}

/// Mock embedder with configurable responses and a call counter.
#[derive(Clone)]
pub struct MockEmbedder {
    behavior: EmbedBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    fn with(behavior: EmbedBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn returning(vector: Vec<f32>) -> Self {
        Self::with(EmbedBehavior::Fixed(vector))
    }

    pub fn keyed(pairs: Vec<(&str, Vec<f32>)>, fallback: Vec<f32>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self::with(EmbedBehavior::Keyed(pairs, fallback))
    }

    pub fn unavailable() -> Self {
        Self::with(EmbedBehavior::Unavailable)
    }

    pub fn failing() -> Self {
        Self::with(EmbedBehavior::Failing)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EmbedBehavior::Fixed(v) => Ok(v.clone()),
            EmbedBehavior::Keyed(pairs, fallback) => {
                let text = text.to_lowercase();
                Ok(pairs
                    .iter()
                    .find(|(k, _)| text.contains(k.as_str()))
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| fallback.clone()))
            }
            EmbedBehavior::Unavailable => Err(PortError::Unavailable("no api key".to_string())),
            EmbedBehavior::Failing => Err(PortError::Unexpected("embedding backend exploded".to_string())),
        }
    }
}

/// Mock metadata fetcher returning a canned page or a failure.
#[derive(Clone)]
pub struct MockFetcher {
    response: Option<PageMetadata>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn returning(title: Option<&str>, summary: Option<&str>, body_length: u32) -> Self {
        Self {
            response: Some(PageMetadata {
                title: title.map(str::to_string),
                summary: summary.map(str::to_string),
                body_length,
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> PortResult<PageMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| PortError::Unexpected(format!("timed out fetching {}", url)))
    }
}

/// Mock summarizer that echoes its input behind a prefix.
#[derive(Clone)]
pub struct MockSummarizer {
    available: bool,
}

impl MockSummarizer {
    pub fn echoing() -> Self {
        Self { available: true }
    }

    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

#[async_trait]
impl InsightSummarizer for MockSummarizer {
    async fn summarize(&self, bullet_text: &str) -> PortResult<String> {
        if !self.available {
            return Err(PortError::Unavailable("no api key".to_string()));
        }
        Ok(format!("AI: {}", bullet_text))
    }
}

/// Builds an article fixture through the store so ids and ownership are real.
pub async fn seed_article(
    store: &dyn ArticleStore,
    user_id: Uuid,
    url: &str,
    title: &str,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
) -> Article {
    store
        .create_article(
            user_id,
            NewArticle {
                url: url.to_string(),
                title: title.to_string(),
                created_at: Some(created_at),
                read_at,
                ..NewArticle::default()
            },
        )
        .await
        .unwrap()
}
