use axum::{extract::State, routing::get, Json, Router};
use boardroom_schema::TopicsResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_topics))
}

async fn list_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: state.roster.topic_infos(),
    })
}
