//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every handler except `health_handler` runs behind `require_principal`,
//! so a `Principal` is always present in the request extensions.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use lorelog_core::insights::{DailyActivity, RecommendedTag, TagCount};
use lorelog_core::{
    Article, AutoTagReport, CleanupReport, CoreError, EnrichmentState, IngestMode, IngestOutcome,
    InsightStats, Principal, SearchStrategy, WeeklyInsight,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 500;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_articles_handler,
        create_article_handler,
        delete_article_handler,
        mark_read_handler,
        enrich_article_handler,
        search_handler,
        insights_handler,
        stats_handler,
        auto_tag_handler,
        cleanup_tags_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ArticleResponse,
            CreateArticleRequest,
            CreateArticleResponse,
            SearchRequest,
            SearchResponse,
            WeeklyInsightResponse,
            StatsResponse,
            DailyActivityResponse,
            TagCountResponse,
            RecommendedTagResponse,
            AutoTagResponse,
            CleanupResponse,
        )
    ),
    tags(
        (name = "Lorelog API", description = "Save articles, search them and review what you read.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    ok: bool,
    /// `db` or `fallback`.
    storage: String,
    db_configured: bool,
}

/// An article as returned to clients. The embedding is never exposed.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    id: Uuid,
    url: String,
    title: String,
    summary: Option<String>,
    body_length: Option<u32>,
    tags: Vec<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            url: article.url,
            title: article.title,
            summary: article.summary,
            body_length: article.body_length,
            tags: article.tags,
            read_at: article.read_at,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateArticleRequest {
    url: String,
    /// Return right after the insert and enrich in the background.
    #[serde(default)]
    fast: bool,
}

#[derive(Serialize, ToSchema)]
pub struct CreateArticleResponse {
    article: ArticleResponse,
    /// `created`, `enriching`, `enriched` or `enrich_failed`.
    state: String,
}

impl CreateArticleResponse {
    fn new(outcome: IngestOutcome, state: EnrichmentState) -> Self {
        Self {
            article: outcome.article.into(),
            state: enrichment_state_label(state).to_string(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Maximum number of articles, newest first.
    limit: Option<usize>,
}

#[derive(Deserialize, ToSchema)]
pub struct SearchRequest {
    query: String,
}

#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    /// `semantic` or `lexical`.
    strategy: String,
    articles: Vec<ArticleResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyInsightResponse {
    week_start: NaiveDate,
    read_count: usize,
    top_tags: Vec<String>,
    summary: String,
}

impl From<WeeklyInsight> for WeeklyInsightResponse {
    fn from(insight: WeeklyInsight) -> Self {
        Self {
            week_start: insight.week_start,
            read_count: insight.read_count,
            top_tags: insight.top_tags,
            summary: insight.summary,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Weeks before the current one; 0 is this week, negative values look ahead.
    week_offset: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyActivityResponse {
    day: String,
    date: NaiveDate,
    saved: usize,
    read: usize,
}

impl From<DailyActivity> for DailyActivityResponse {
    fn from(activity: DailyActivity) -> Self {
        Self {
            day: activity.day.to_string(),
            date: activity.date,
            saved: activity.saved,
            read: activity.read,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TagCountResponse {
    name: String,
    count: usize,
}

impl From<TagCount> for TagCountResponse {
    fn from(tag: TagCount) -> Self {
        Self {
            name: tag.name,
            count: tag.count,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedTagResponse {
    name: String,
    score: f64,
    count: usize,
    read_count: usize,
    reasons: Vec<String>,
}

impl From<RecommendedTag> for RecommendedTagResponse {
    fn from(tag: RecommendedTag) -> Self {
        Self {
            name: tag.name,
            score: tag.score,
            count: tag.count,
            read_count: tag.read_count,
            reasons: tag.reasons.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    saved: usize,
    read: usize,
    read_percentage: u32,
    weekly_activity: Vec<DailyActivityResponse>,
    tags: Vec<TagCountResponse>,
    recommended_tags: Vec<RecommendedTagResponse>,
}

impl From<InsightStats> for StatsResponse {
    fn from(stats: InsightStats) -> Self {
        Self {
            saved: stats.saved,
            read: stats.read,
            read_percentage: stats.read_percentage,
            weekly_activity: stats.weekly_activity.into_iter().map(Into::into).collect(),
            tags: stats.tags.into_iter().map(Into::into).collect(),
            recommended_tags: stats.recommended_tags.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoTagResponse {
    processed: usize,
    added_tags: usize,
    remaining: usize,
}

impl From<AutoTagReport> for AutoTagResponse {
    fn from(report: AutoTagReport) -> Self {
        Self {
            processed: report.processed,
            added_tags: report.added_tags,
            remaining: report.remaining,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CleanupResponse {
    removed: usize,
    remaining: usize,
}

impl From<CleanupReport> for CleanupResponse {
    fn from(report: CleanupReport) -> Self {
        Self {
            removed: report.removed,
            remaining: report.remaining,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

/// Validation and ownership problems go back to the caller verbatim;
/// storage details are logged and replaced by `context`.
fn core_error(context: &str, err: CoreError) -> HandlerError {
    match err {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        CoreError::Storage(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

fn enrichment_state_label(state: EnrichmentState) -> &'static str {
    match state {
        EnrichmentState::Created => "created",
        EnrichmentState::Enriching => "enriching",
        EnrichmentState::Enriched => "enriched",
        EnrichmentState::EnrichFailed => "enrich_failed",
    }
}

fn strategy_label(strategy: SearchStrategy) -> &'static str {
    match strategy {
        SearchStrategy::Semantic => "semantic",
        SearchStrategy::Lexical => "lexical",
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Report which store is serving requests and whether it is reachable.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = match app_state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check failed: {}", e);
            false
        }
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = HealthResponse {
        ok,
        storage: app_state.store.kind().as_str().to_string(),
        db_configured: app_state.config.database_configured(),
    };
    (status, Json(response))
}

/// List the caller's articles, newest first.
#[utoipa::path(
    get,
    path = "/articles",
    params(
        ListQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "The caller's articles", body = [ArticleResponse]),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_articles_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let articles = app_state
        .store
        .list_articles(principal.user_id, limit)
        .await
        .map_err(|e| core_error("Failed to list articles", e.into()))?;

    let body: Vec<ArticleResponse> = articles.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Save a URL.
///
/// Without `fast` the page is fetched, embedded and tagged before the
/// response is sent. With `fast` the article is returned right away and
/// enriched in the background.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = CreateArticleRequest,
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-email" = Option<String>, Header, description = "The user's email."),
        ("x-user-name" = Option<String>, Header, description = "The user's display name.")
    ),
    responses(
        (status = 201, description = "Article saved", body = CreateArticleResponse),
        (status = 400, description = "Missing or malformed URL"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mode = if payload.fast {
        IngestMode::Fast
    } else {
        IngestMode::Full
    };
    let outcome = app_state
        .pipeline
        .ingest(&principal, &payload.url, mode)
        .await
        .map_err(|e| core_error("Failed to save article", e))?;

    if mode == IngestMode::Full {
        let state = outcome.state;
        return Ok((StatusCode::CREATED, Json(CreateArticleResponse::new(outcome, state))));
    }

    let pipeline = app_state.pipeline.clone();
    let user_id = principal.user_id;
    let article_id = outcome.article.id;
    tokio::spawn(async move {
        match pipeline.enrich(user_id, article_id).await {
            Ok(result) => info!(
                article_id = %article_id,
                state = enrichment_state_label(result.state),
                "Background enrichment finished"
            ),
            Err(e) => error!(article_id = %article_id, "Background enrichment failed: {}", e),
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateArticleResponse::new(outcome, EnrichmentState::Enriching)),
    ))
}

/// Delete one of the caller's articles.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(
        ("id" = Uuid, Path, description = "The article ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 404, description = "No such article for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let deleted = app_state
        .store
        .delete_article(principal.user_id, id)
        .await
        .map_err(|e| core_error("Failed to delete article", e.into()))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Article {} not found", id)))
    }
}

/// Mark an article as read now.
#[utoipa::path(
    post,
    path = "/articles/{id}/read",
    params(
        ("id" = Uuid, Path, description = "The article ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Article marked as read", body = ArticleResponse),
        (status = 401, description = "Missing or invalid identity"),
        (status = 404, description = "No such article for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mark_read_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let article = app_state
        .store
        .mark_read(principal.user_id, id, Utc::now())
        .await
        .map_err(|e| core_error("Failed to mark article as read", e.into()))?;
    Ok(Json(ArticleResponse::from(article)))
}

/// Retry enrichment of an existing article.
#[utoipa::path(
    post,
    path = "/articles/{id}/enrich",
    params(
        ("id" = Uuid, Path, description = "The article ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Enrichment attempted", body = CreateArticleResponse),
        (status = 401, description = "Missing or invalid identity"),
        (status = 404, description = "No such article for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn enrich_article_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = app_state
        .pipeline
        .enrich(principal.user_id, id)
        .await
        .map_err(|e| core_error("Failed to enrich article", e))?;
    let state = outcome.state;
    Ok(Json(CreateArticleResponse::new(outcome, state)))
}

/// Search the caller's articles, semantically when possible.
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Matching articles", body = SearchResponse),
        (status = 400, description = "Blank query"),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn search_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let results = app_state
        .search
        .search(principal.user_id, &payload.query)
        .await
        .map_err(|e| core_error("Search failed", e))?;

    Ok(Json(SearchResponse {
        strategy: strategy_label(results.strategy).to_string(),
        articles: results.articles.into_iter().map(Into::into).collect(),
    }))
}

/// Weekly reading insights, newest week first.
#[utoipa::path(
    get,
    path = "/insights",
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "One entry per week with reads", body = [WeeklyInsightResponse]),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn insights_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HandlerError> {
    let insights = app_state
        .insights
        .weekly_insights(principal.user_id)
        .await
        .map_err(|e| core_error("Failed to build insights", e))?;

    let body: Vec<WeeklyInsightResponse> = insights.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Totals, a weekly activity chart, tag frequencies and tag recommendations.
#[utoipa::path(
    get,
    path = "/insights/stats",
    params(
        StatsQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Reading statistics", body = StatsResponse),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = app_state
        .insights
        .stats(principal.user_id, query.week_offset.unwrap_or(0), Utc::now())
        .await
        .map_err(|e| core_error("Failed to build stats", e))?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Extract and attach tags for the caller's newest untagged articles.
#[utoipa::path(
    post,
    path = "/tags/auto",
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Backfill report", body = AutoTagResponse),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn auto_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HandlerError> {
    let report = app_state
        .maintenance
        .auto_tag(principal.user_id)
        .await
        .map_err(|e| core_error("Auto-tagging failed", e))?;
    Ok(Json(AutoTagResponse::from(report)))
}

/// Detach noisy tags from the caller's articles.
#[utoipa::path(
    post,
    path = "/tags/cleanup",
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Cleanup report", body = CleanupResponse),
        (status = 401, description = "Missing or invalid identity"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn cleanup_tags_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HandlerError> {
    let report = app_state
        .maintenance
        .cleanup_tags(principal.user_id)
        .await
        .map_err(|e| core_error("Tag cleanup failed", e))?;
    Ok(Json(CleanupResponse::from(report)))
}
