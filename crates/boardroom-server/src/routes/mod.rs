pub mod agents;
pub mod generate;
pub mod health;
pub mod topics;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/generate-message", generate::router())
        .nest("/agents", agents::router())
        .nest("/topics", topics::router())
        .nest("/health", health::router())
}
