//! `/api/faqs`: list, add and delete a tenant's FAQs.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use faqbot_core::AppContext;
use faqbot_shared::FaqBotError;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqQuery {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaq {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

fn required(value: Option<&str>, message: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::bad_request(message)),
    }
}

fn storage_failure(e: FaqBotError) -> ApiError {
    error!(error = %e, "faq storage failed");
    ApiError::internal("Storage error")
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<FaqQuery>,
) -> Result<Json<Value>, ApiError> {
    let tenant_id = required(query.tenant_id.as_deref(), "Missing tenantId")?;
    let faqs = ctx
        .storage
        .list_faqs(&tenant_id, query.limit)
        .await
        .map_err(storage_failure)?;
    Ok(Json(json!({ "faqs": faqs })))
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body: NewFaq = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    let tenant_id = required(body.tenant_id.as_deref(), "Missing tenantId")?;
    let question = required(body.question.as_deref(), "Missing question")?;
    let answer = required(body.answer.as_deref(), "Missing answer")?;

    let faq = ctx
        .storage
        .insert_faq(&tenant_id, &question, &answer)
        .await
        .map_err(storage_failure)?;
    Ok((StatusCode::CREATED, Json(json!({ "faq": faq }))))
}

pub async fn remove(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<FaqQuery>,
) -> Result<Json<Value>, ApiError> {
    let tenant_id = required(query.tenant_id.as_deref(), "Missing tenantId")?;
    let id = required(query.id.as_deref(), "Missing id")?;

    let deleted = ctx
        .storage
        .delete_faq(&tenant_id, &id)
        .await
        .map_err(storage_failure)?;
    if !deleted {
        return Err(ApiError::not_found("FAQ not found"));
    }
    Ok(Json(json!({ "deleted": true })))
}
