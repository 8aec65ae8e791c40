//! Core domain types for FAQBot tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimensionality of stored chunk embeddings (`text-embedding-3-small`).
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Generate a new time-sortable row identifier.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

// ---------------------------------------------------------------------------
// Faq
// ---------------------------------------------------------------------------

/// A question/answer pair owned by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub id: String,
    pub tenant_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pages and chunks
// ---------------------------------------------------------------------------

/// Bookkeeping for a crawled page, used to skip unchanged pages on re-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub tenant_id: String,
    pub url: String,
    /// SHA-256 of the extracted plain text.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub chunk_count: usize,
}

/// A chunk of page text ready to be written with its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub tenant_id: String,
    pub url: String,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub url: String,
    pub content: String,
    /// Cosine similarity in `[-1, 1]`; higher is closer.
    pub similarity: f64,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Billing state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// A tenant's subscription as recorded from payment-provider webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub tenant_id: String,
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_session_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
