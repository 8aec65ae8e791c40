//! HTTP page fetcher shared by sitemap discovery and the import pipeline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use faqbot_shared::{FaqBotError, Result};

use crate::extract::{extract_text, extract_title};
use crate::guard::{PublicOnlyResolver, is_ssrf_target};

/// User-Agent string for crawl requests.
pub const DEFAULT_USER_AGENT: &str = concat!("FAQBot/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each HTTP request in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Allow localhost/private IPs (local development, mock servers).
    pub allow_localhost: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_localhost: false,
        }
    }
}

// ---------------------------------------------------------------------------
// FetchedPage
// ---------------------------------------------------------------------------

/// A fetched page with its extracted text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub html: String,
    /// Flattened body text (may be empty).
    pub text: String,
    pub title: Option<String>,
    /// SHA-256 hex digest of `text`.
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP client wrapper with SSRF protection and a fixed user agent.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    allow_localhost: bool,
    max_body_bytes: usize,
}

impl Fetcher {
    /// Create a new fetcher with the given options.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(opts, Client::builder())?,
            allow_localhost: opts.allow_localhost,
            max_body_bytes: MAX_RESPONSE_SIZE,
        })
    }

    fn checked_url(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| FaqBotError::validation(format!("invalid URL {url}: {e}")))?;
        if !self.allow_localhost && is_ssrf_target(&parsed) {
            warn!(%url, "SSRF protection: blocked");
            return Err(FaqBotError::validation(format!(
                "refusing to fetch private or non-HTTP address: {url}"
            )));
        }
        Ok(parsed)
    }

    /// Fetch a URL and return its status code and body text.
    pub async fn fetch_text(&self, url: &str) -> Result<(u16, String)> {
        let parsed = self.checked_url(url)?;
        debug!(%url, "fetching");

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FaqBotError::Network(format!("{url}: HTTP {status}")));
        }

        // Streamed so that bodies without a Content-Length are capped too.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: body read failed: {e}")))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FaqBotError::Network(format!(
                    "{url}: response too large (max {} bytes)",
                    self.max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((status.as_u16(), String::from_utf8_lossy(&body).into_owned()))
    }

    /// Whether a GET on `url` answers with a 2xx status.
    pub async fn is_reachable(&self, url: &str) -> bool {
        let Ok(parsed) = self.checked_url(url) else {
            return false;
        };
        match self.client.get(parsed).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(%url, error = %e, "not reachable");
                false
            }
        }
    }

    /// Fetch a single page and extract its text.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let (status_code, html) = self.fetch_text(url).await?;

        let text = extract_text(&html);
        let title = extract_title(&html);
        let content_hash = compute_hash(&text);

        Ok(FetchedPage {
            url: url.to_string(),
            status_code,
            html,
            text,
            title,
            content_hash,
        })
    }

    /// Fetch a page, logging and returning `None` on any failure.
    pub async fn fetch_or_skip(&self, url: &str) -> Option<FetchedPage> {
        match self.fetch_page(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(%url, error = %e, "fetch failed, skipping");
                None
            }
        }
    }
}

fn build_client(opts: &FetchOptions, builder: ClientBuilder) -> Result<Client> {
    let mut builder = builder
        .user_agent(opts.user_agent.as_str())
        .redirect(redirect_policy(opts.allow_localhost))
        .timeout(Duration::from_secs(opts.timeout_secs));
    if !opts.allow_localhost {
        builder = builder.dns_resolver(Arc::new(PublicOnlyResolver));
    }
    builder
        .build()
        .map_err(|e| FaqBotError::Network(format!("failed to build HTTP client: {e}")))
}

/// Follows at most [`MAX_REDIRECTS`] hops, each one checked by the SSRF guard.
fn redirect_policy(allow_localhost: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"))
        } else if !allow_localhost && is_ssrf_target(attempt.url()) {
            let target = attempt.url().to_string();
            warn!(%target, "SSRF protection: redirect blocked");
            attempt.error(format!(
                "refusing redirect to private or non-HTTP address: {target}"
            ))
        } else {
            attempt.follow()
        }
    })
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
