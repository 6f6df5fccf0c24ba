use crate::error::AppError;
use crate::models::TokensQuery;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use token_feed::{FeedStats, RecentTokens};

pub async fn recent_tokens(
    State(state): State<AppState>,
    Query(query): Query<TokensQuery>,
) -> Result<Json<RecentTokens>, AppError> {
    let limit = query.limit()?;
    let page = state.feed.recent(limit);

    tracing::debug!(
        requested = ?limit,
        returned = page.entries.len(),
        total = page.total_count,
        "Served recent tokens"
    );

    Ok(Json(page))
}

pub async fn stats(State(state): State<AppState>) -> Json<FeedStats> {
    Json(state.feed.stats())
}

pub async fn not_found() -> AppError {
    AppError::NotFound("no such route".into())
}
