//! Sitemap XML parser.
//!
//! Handles both document kinds defined by <https://www.sitemaps.org/>:
//! - `<urlset>` with `<url><loc>` page entries
//! - `<sitemapindex>` with `<sitemap><loc>` references to further sitemaps

use std::io::Cursor;

use sitemap::reader::{SiteMapEntity, SiteMapReader};
use tracing::warn;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Locations found in one sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSitemap {
    /// Page URLs from `<url><loc>` entries, in document order.
    pub urls: Vec<String>,
    /// Sitemap URLs from `<sitemap><loc>` entries, in document order.
    pub nested_sitemaps: Vec<String>,
}

impl ParsedSitemap {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.nested_sitemaps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a sitemap document into page and nested-sitemap locations.
///
/// Entries whose location is missing or not an absolute URL are dropped.
pub fn parse_sitemap(xml: &str) -> ParsedSitemap {
    let mut parsed = ParsedSitemap::default();
    let reader = SiteMapReader::new(Cursor::new(xml.as_bytes()));

    for entity in reader {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    parsed.urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    parsed.nested_sitemaps.push(url.to_string());
                }
            }
            SiteMapEntity::Err(error) => {
                warn!(%error, "skipping malformed sitemap entry");
            }
        }
    }

    parsed
}
