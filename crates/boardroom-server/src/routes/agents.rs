use axum::{extract::State, routing::get, Json, Router};
use boardroom_schema::AgentsResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_agents))
}

async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: state.roster.agent_infos(),
    })
}
