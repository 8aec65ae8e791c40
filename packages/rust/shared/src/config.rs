//! Application configuration for FAQBot.
//!
//! User config lives at `~/.faqbot/faqbot.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file; it only names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FaqBotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "faqbot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".faqbot";

// ---------------------------------------------------------------------------
// Config structs (matching faqbot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub billing: BillingConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP API binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Public base URL, used for checkout redirects and the widget snippet.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: default_public_url(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".into()
}
fn default_public_url() -> String {
    "http://localhost:3000".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.faqbot/faqbot.db".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_openai_timeout() -> u64 {
    60
}

/// `[import]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Pages imported when the request does not say.
    #[serde(default = "default_max_pages")]
    pub default_max_pages: u32,

    /// Upper bound a request may ask for.
    #[serde(default = "default_max_pages_limit")]
    pub max_pages_limit: u32,

    /// Per-request timeout when fetching sitemaps and pages.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Words per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks sent per embeddings request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Refuse imports for tenants without an active subscription.
    #[serde(default)]
    pub require_subscription: bool,

    /// Allow fetching loopback/private hosts (local development only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_max_pages: default_max_pages(),
            max_pages_limit: default_max_pages_limit(),
            fetch_timeout_secs: default_fetch_timeout(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_batch_size: default_embed_batch_size(),
            user_agent: default_user_agent(),
            require_subscription: false,
            allow_private_hosts: false,
        }
    }
}

fn default_max_pages() -> u32 {
    50
}
fn default_max_pages_limit() -> u32 {
    200
}
fn default_fetch_timeout() -> u64 {
    15
}
fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_embed_batch_size() -> usize {
    50
}
fn default_user_agent() -> String {
    concat!("FAQBot/", env!("CARGO_PKG_VERSION")).into()
}

impl ImportConfig {
    /// Clamp a requested page cap into `1..=max_pages_limit`, defaulting when absent or zero.
    pub fn clamp_max_pages(&self, requested: Option<u32>) -> u32 {
        let requested = requested
            .filter(|n| *n > 0)
            .unwrap_or(self.default_max_pages);
        requested.clamp(1, self.max_pages_limit.max(1))
    }
}

/// `[chat]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Website excerpts retrieved per question.
    #[serde(default = "default_match_count")]
    pub match_count: u32,

    /// FAQs included by the FAQ-only `ask` flow.
    #[serde(default = "default_ask_faq_limit")]
    pub ask_faq_limit: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            match_count: default_match_count(),
            ask_faq_limit: default_ask_faq_limit(),
        }
    }
}

fn default_match_count() -> u32 {
    5
}
fn default_ask_faq_limit() -> u32 {
    200
}

/// `[billing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Name of the env var holding the Stripe secret key.
    #[serde(default = "default_stripe_key_env")]
    pub secret_key_env: String,

    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key_env: default_stripe_key_env(),
            api_base: default_stripe_api_base(),
        }
    }
}

fn default_stripe_key_env() -> String {
    "STRIPE_SECRET_KEY".into()
}
fn default_stripe_api_base() -> String {
    "https://api.stripe.com/v1".into()
}

impl AppConfig {
    /// Resolve the configured database path, expanding a leading `~`.
    pub fn database_path(&self) -> Result<PathBuf> {
        expand_home(&self.storage.database_path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.faqbot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FaqBotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.faqbot/faqbot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FaqBotError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FaqBotError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FaqBotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FaqBotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FaqBotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the env var named by `var_name`.
pub fn resolve_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(FaqBotError::config(format!(
            "Missing {var_name}. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the OpenAI API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_secret(&config.openai.api_key_env).map(|_| ())
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| FaqBotError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
