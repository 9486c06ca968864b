pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_principal;
pub use rest::ApiDoc;
pub use state::AppState;

use rest::{
    auto_tag_handler, cleanup_tags_handler, create_article_handler, delete_article_handler,
    enrich_article_handler, health_handler, insights_handler, list_articles_handler,
    mark_read_handler, search_handler, stats_handler,
};

/// Builds the API routes. `/health` is public; everything else needs an identity.
pub fn router(app_state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/articles",
            get(list_articles_handler).post(create_article_handler),
        )
        .route("/articles/{id}", delete(delete_article_handler))
        .route("/articles/{id}/read", post(mark_read_handler))
        .route("/articles/{id}/enrich", post(enrich_article_handler))
        .route("/search", post(search_handler))
        .route("/insights", get(insights_handler))
        .route("/insights/stats", get(stats_handler))
        .route("/tags/auto", post(auto_tag_handler))
        .route("/tags/cleanup", post(cleanup_tags_handler))
        .route_layer(axum_middleware::from_fn(require_principal));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected_routes)
        .with_state(app_state)
}
