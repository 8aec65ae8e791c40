//! Stripe checkout sessions and webhook intake.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use faqbot_shared::{
    AppConfig, BillingConfig, FaqBotError, Result, Subscription, SubscriptionStatus,
    resolve_secret,
};
use faqbot_storage::Storage;

const STRIPE_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: Option<StripeErrorDetail>,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Minimal Stripe REST client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
    public_url: String,
}

impl StripeClient {
    pub fn new(
        billing: &BillingConfig,
        public_url: &str,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(STRIPE_TIMEOUT_SECS))
            .build()
            .map_err(|e| FaqBotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: billing.api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client with the secret key read from the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let key = resolve_secret(&config.billing.secret_key_env)?;
        Self::new(&config.billing, &config.server.public_url, key)
    }

    /// Create a subscription checkout session for one unit of `price_id`.
    #[instrument(skip_all, fields(price_id = %price_id, tenant_id = ?tenant_id))]
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<CheckoutSession> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".into()),
            ("line_items[0][price]", price_id.into()),
            ("line_items[0][quantity]", "1".into()),
            (
                "success_url",
                format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.public_url),
            ),
            ("cancel_url", format!("{}/pricing?canceled=1", self.public_url)),
        ];
        if let Some(tenant) = tenant_id.filter(|t| !t.is_empty()) {
            form.push(("client_reference_id", tenant.into()));
        }

        let url = format!("{}/checkout/sessions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(FaqBotError::Billing(message));
        }

        let session: CheckoutSession = serde_json::from_str(&text)
            .map_err(|e| FaqBotError::Billing(format!("invalid checkout session: {e}")))?;
        info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// A webhook event as delivered by Stripe.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

/// What a webhook event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    SubscriptionActivated { tenant_id: String },
    Ignored,
}

/// Parse a raw webhook body.
pub fn parse_webhook(raw: &str) -> Result<WebhookEvent> {
    serde_json::from_str(raw).map_err(|e| FaqBotError::parse(format!("webhook body: {e}")))
}

/// Apply a webhook event to stored subscriptions.
#[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn handle_webhook_event(storage: &Storage, event: &WebhookEvent) -> Result<WebhookOutcome> {
    if event.event_type != "checkout.session.completed" {
        info!("webhook event acknowledged without action");
        return Ok(WebhookOutcome::Ignored);
    }

    let object = &event.data.object;
    let field = |name: &str| {
        object
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let Some(tenant_id) = field("client_reference_id") else {
        info!(session_id = ?field("id"), "checkout completed without a tenant reference");
        return Ok(WebhookOutcome::Ignored);
    };

    storage
        .upsert_subscription(&Subscription {
            tenant_id: tenant_id.clone(),
            status: SubscriptionStatus::Active,
            stripe_customer_id: field("customer"),
            stripe_session_id: field("id"),
            updated_at: Utc::now(),
        })
        .await?;

    info!(%tenant_id, "subscription active");
    Ok(WebhookOutcome::SubscriptionActivated { tenant_id })
}
