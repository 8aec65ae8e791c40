//! Shared types, error model, and configuration for FAQBot.
//!
//! This crate is the foundation depended on by all other FAQBot crates.
//! It provides:
//! - [`FaqBotError`]: the unified error type
//! - Domain types ([`Faq`], [`PageRecord`], [`ChunkRow`], [`ChunkMatch`], [`Subscription`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BillingConfig, ChatConfig, ImportConfig, OpenAiConfig, ServerConfig,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_secret, validate_api_key,
};
pub use error::{FaqBotError, Result};
pub use types::{
    ChunkMatch, ChunkRow, EMBEDDING_DIMENSIONS, Faq, PageRecord, Subscription,
    SubscriptionStatus, new_id,
};
