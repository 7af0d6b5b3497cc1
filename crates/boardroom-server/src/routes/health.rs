use axum::{routing::get, Json, Router};
use boardroom_schema::HealthResponse;
use chrono::Utc;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Server is running".to_string(),
        timestamp: Utc::now(),
    })
}
