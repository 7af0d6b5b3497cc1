use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use boardroom_schema::{GenerateMessageRequest, GenerateMessageResponse};

use crate::state::AppState;

const GENERATION_FAILED: &str = "Failed to generate message";

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(generate_message))
}

async fn generate_message(
    State(state): State<AppState>,
    payload: Result<Json<GenerateMessageRequest>, JsonRejection>,
) -> (StatusCode, Json<GenerateMessageResponse>) {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected generate-message body");
            return (
                StatusCode::BAD_REQUEST,
                Json(GenerateMessageResponse::failure(rejection.body_text())),
            );
        }
    };

    match state.generator.generate(&request).await {
        Ok(generated) => (StatusCode::OK, Json(GenerateMessageResponse::ok(generated))),
        Err(err) => {
            tracing::error!(detail = err.detail(), "generate-message failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerateMessageResponse::failure(GENERATION_FAILED)),
            )
        }
    }
}
