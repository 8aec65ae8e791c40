//! `/api/checkout` and `/api/stripe-webhook`.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use faqbot_core::AppContext;
use faqbot_core::billing::{handle_webhook_event, parse_webhook};

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

pub async fn checkout_status() -> Json<Value> {
    Json(json!({ "ok": true, "method": "GET" }))
}

pub async fn checkout(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: CheckoutBody = serde_json::from_slice(&body).unwrap_or_default();
    let Some(price_id) = body.price_id.filter(|p| !p.trim().is_empty()) else {
        return Err(ApiError::bad_request("Missing priceId"));
    };

    let session = async {
        ctx.stripe()?
            .create_checkout_session(price_id.trim(), body.tenant_id.as_deref())
            .await
    }
    .await;

    match session {
        Ok(session) => Ok(Json(json!({ "url": session.url }))),
        Err(e) => {
            error!(error = %e, "checkout failed");
            Err(ApiError::internal("Checkout failed."))
        }
    }
}

/// Any failure answers 400 so the payment provider retries the delivery.
pub async fn stripe_webhook(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let outcome = async {
        let raw = String::from_utf8_lossy(&body);
        let event = parse_webhook(&raw)?;
        handle_webhook_event(&ctx.storage, &event).await
    }
    .await;

    match outcome {
        Ok(_) => Ok(Json(json!({ "received": true }))),
        Err(e) => {
            error!(error = %e, "webhook error");
            Err(ApiError::bad_request("Webhook error"))
        }
    }
}
