//! `/api/chat` and `/api/ask`.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;

use faqbot_core::{AppContext, chat};

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBody {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyBody {
    pub reply: String,
}

pub async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Unparseable bodies are treated as empty so the caller gets the
/// "provide a question" reply instead of a parse error.
pub async fn chat(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<Json<ReplyBody>, ApiError> {
    let body: QuestionBody = serde_json::from_slice(&body).unwrap_or_default();
    let question = body.question.unwrap_or_default();
    let tenant_id = body.tenant_id.unwrap_or_default();

    match chat::answer(&ctx, &tenant_id, &question).await {
        Ok(reply) => Ok(Json(ReplyBody { reply })),
        Err(e) if e.is_validation() => Err(ApiError::bad_request(e.to_string()).as_reply()),
        Err(e) => {
            error!(error = %e, "chat failed");
            Err(ApiError::internal("An error occurred.").as_reply())
        }
    }
}

pub async fn ask(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<Json<ReplyBody>, ApiError> {
    let body: QuestionBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    let question = body.question.unwrap_or_default();
    let tenant_id = body.tenant_id.unwrap_or_default();

    match chat::ask(&ctx, &tenant_id, &question).await {
        Ok(reply) => Ok(Json(ReplyBody { reply })),
        Err(e) if e.is_validation() => Err(ApiError::bad_request(e.to_string())),
        Err(e) => {
            error!(error = %e, "ask failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
