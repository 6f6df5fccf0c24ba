use crate::state::AppState;
use axum::{extract::State, Json};
use token_feed::Liveness;

/// Feed liveness for load balancers and dashboards.
pub async fn health(State(state): State<AppState>) -> Json<Liveness> {
    Json(state.feed.liveness())
}
