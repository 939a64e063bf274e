// src/routes/chat_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::chat::BotMessage;
use crate::models::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_session_id() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub messages: Vec<BotMessage>,
}

/// The bot never surfaces hard errors; a storage fault becomes a bot-voiced
/// 500 and every other failure is an ordinary conversational reply.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    match state.chat.handle(&req.session_id, &req.message).await {
        Ok(messages) => Json(ChatResponse { messages }).into_response(),
        Err(e) => {
            tracing::error!("chat engine failure: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    messages: vec![BotMessage {
                        from: "bot",
                        text: "Server error, please try again later.".to_string(),
                    }],
                }),
            )
                .into_response()
        }
    }
}
