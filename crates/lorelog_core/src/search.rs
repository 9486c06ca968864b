//! crates/lorelog_core/src/search.rs
//!
//! Semantic search over a user's recent articles, degrading to lexical
//! substring search whenever the semantic path cannot produce results.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Article;
use crate::error::{CoreError, CoreResult};
use crate::ports::{ArticleStore, Embedder, PortError, PortResult};
use crate::similarity::{cosine_similarity, parse_embedding};

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// How many of the newest articles are scored semantically.
    pub candidate_window: usize,
    /// Maximum results for either strategy.
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_window: 200,
            result_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Semantic,
    Lexical,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub strategy: SearchStrategy,
    pub articles: Vec<Article>,
}

pub struct SearchService {
    store: Arc<dyn ArticleStore>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(store: Arc<dyn ArticleStore>, embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Only storage errors on the lexical path reach the caller.
    pub async fn search(&self, user_id: Uuid, query: &str) -> CoreResult<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::Validation("query is required".to_string()));
        }

        match self.semantic(user_id, query).await {
            Ok(articles) if !articles.is_empty() => {
                return Ok(SearchResults {
                    strategy: SearchStrategy::Semantic,
                    articles,
                })
            }
            Ok(_) => debug!(user_id = %user_id, "No article has a usable embedding, using lexical search"),
            Err(PortError::Unavailable(reason)) => {
                debug!(user_id = %user_id, "Embeddings unavailable, using lexical search: {}", reason)
            }
            Err(e) => warn!(user_id = %user_id, "Semantic search failed, using lexical search: {}", e),
        }

        let articles = self
            .store
            .search_articles_lexical(user_id, query, self.config.result_limit)
            .await?;
        Ok(SearchResults {
            strategy: SearchStrategy::Lexical,
            articles,
        })
    }

    async fn semantic(&self, user_id: Uuid, query: &str) -> PortResult<Vec<Article>> {
        let query_vector = self.embedder.embed(query).await?;
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .list_articles(user_id, self.config.candidate_window)
            .await?;

        let mut mismatched = 0usize;
        let mut scored: Vec<(f64, Article)> = candidates
            .into_iter()
            .filter_map(|article| {
                let vector = parse_embedding(article.embedding.as_deref())?;
                if vector.len() != query_vector.len() {
                    mismatched += 1;
                    return None;
                }
                Some((cosine_similarity(&query_vector, &vector), article))
            })
            .collect();

        if mismatched > 0 {
            warn!(
                user_id = %user_id,
                mismatched,
                expected = query_vector.len(),
                "Skipped articles whose stored embedding dimension differs from the query"
            );
        }

        // Stable: equal scores keep newest-first order.
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        scored.truncate(self.config.result_limit);
        Ok(scored.into_iter().map(|(_, article)| article).collect())
    }
}
