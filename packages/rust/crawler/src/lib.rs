//! Page fetching and plain-text extraction.
//!
//! This crate provides:
//! - [`Fetcher`]: HTTP client with timeout, user agent and SSRF protection
//! - [`extract_text`]: HTML to whitespace-collapsed body text
//! - [`is_ssrf_target`]: refuses private, loopback and non-HTTP targets

pub mod extract;
pub mod fetch;
pub mod guard;

pub use extract::{extract_text, extract_title};
pub use fetch::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, FetchOptions, FetchedPage, Fetcher, compute_hash,
};
pub use guard::is_ssrf_target;
