use crate::handlers::{health, tokens};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tokens", get(tokens::recent_tokens))
        .route("/stats", get(tokens::stats));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .fallback(tokens::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
