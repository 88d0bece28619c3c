use axum::{Json, extract::State};
use serde::Serialize;

use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    jobs: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        jobs: state.registry.len().await,
    })
}
