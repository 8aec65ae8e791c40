//! Sitemap discovery and page URL collection.
//!
//! Before a site can be indexed we need its page URLs. They come from a
//! sitemap, either fetched from a URL or uploaded as raw XML. Sitemap
//! indexes are expanded breadth-first, staying on the sitemap's origin, until
//! the page cap is reached.

mod parser;

use std::collections::{HashSet, VecDeque};

use faqbot_crawler::{FetchOptions, Fetcher};
use faqbot_shared::{FaqBotError, Result};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use parser::{ParsedSitemap, parse_sitemap};

/// Sitemap paths tried when only a site URL is known.
const WELL_KNOWN_SITEMAPS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

// ---------------------------------------------------------------------------
// Sources and results
// ---------------------------------------------------------------------------

/// Where the first sitemap document comes from.
#[derive(Debug, Clone)]
pub enum SitemapSource {
    /// Fetch the sitemap from this URL.
    Url(Url),
    /// Raw XML uploaded by the caller; no origin is known.
    Uploaded(String),
    /// Raw XML uploaded alongside the URL it was taken from.
    UploadedWithUrl { xml: String, url: Url },
}

impl SitemapSource {
    /// Build a source from an optional sitemap URL and an optional upload.
    ///
    /// A non-blank upload wins over the URL, but the URL still supplies the
    /// origin used for filtering.
    pub fn from_parts(sitemap_url: Option<&str>, uploaded_xml: Option<String>) -> Result<Self> {
        let url = sitemap_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Url::parse(s).map_err(|_| s.to_string()));
        let xml = uploaded_xml.filter(|x| !x.trim().is_empty());

        match (xml, url) {
            (Some(xml), Some(Ok(url))) => Ok(Self::UploadedWithUrl { xml, url }),
            (Some(xml), _) => Ok(Self::Uploaded(xml)),
            (None, Some(Ok(url))) => Ok(Self::Url(url)),
            (None, Some(Err(raw))) => {
                warn!(sitemap_url = %raw, "sitemap URL does not parse");
                Err(FaqBotError::validation("Failed to fetch sitemapUrl"))
            }
            (None, None) => Err(FaqBotError::validation(
                "Provide sitemapUrl or upload sitemap.xml",
            )),
        }
    }

    /// Short description for logs and import job records.
    pub fn label(&self) -> String {
        match self {
            Self::Url(url) => url.to_string(),
            Self::Uploaded(_) => "uploaded sitemap".to_string(),
            Self::UploadedWithUrl { url, .. } => format!("uploaded sitemap ({url})"),
        }
    }

    fn origin(&self) -> Option<String> {
        match self {
            Self::Url(url) | Self::UploadedWithUrl { url, .. } => origin_of(url.as_str()),
            Self::Uploaded(_) => None,
        }
    }
}

/// Page URLs collected from a sitemap.
#[derive(Debug, Clone)]
pub struct SitemapDiscovery {
    /// Origin (`scheme://host[:port]`) the pages were filtered against, if known.
    pub origin: Option<String>,
    /// De-duplicated page URLs, in first-seen order, capped at `max_pages`.
    pub page_urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Upper bound on collected page URLs.
    pub max_pages: usize,
    pub user_agent: String,
    pub allow_localhost: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            timeout_secs: fetch.timeout_secs,
            max_pages: 50,
            user_agent: fetch.user_agent,
            allow_localhost: false,
        }
    }
}

impl DiscoveryOptions {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout_secs: self.timeout_secs,
            user_agent: self.user_agent.clone(),
            allow_localhost: self.allow_localhost,
        }
    }
}

// ---------------------------------------------------------------------------
// Origin helpers
// ---------------------------------------------------------------------------

/// The `scheme://host[:port]` origin of a URL, omitting default ports.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Whether `url` belongs to `origin`. Unparseable URLs never match.
pub fn is_same_origin(url: &str, origin: &str) -> bool {
    origin_of(url).is_some_and(|o| o == origin)
}

fn matches_origin(url: &str, origin: Option<&str>) -> bool {
    origin.is_none_or(|o| is_same_origin(url, o))
}

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Collect page URLs from a sitemap source.
pub async fn discover_pages(
    source: &SitemapSource,
    opts: &DiscoveryOptions,
) -> Result<SitemapDiscovery> {
    let fetcher = Fetcher::new(&opts.fetch_options())?;
    discover_pages_with(&fetcher, source, opts.max_pages).await
}

/// Collect page URLs from a sitemap source using an existing fetcher.
#[instrument(skip_all, fields(source = %source.label(), max_pages = max_pages))]
pub async fn discover_pages_with(
    fetcher: &Fetcher,
    source: &SitemapSource,
    max_pages: usize,
) -> Result<SitemapDiscovery> {
    let mut origin = source.origin();

    let xml = match source {
        SitemapSource::Uploaded(xml) | SitemapSource::UploadedWithUrl { xml, .. } => xml.clone(),
        SitemapSource::Url(url) => match fetcher.fetch_text(url.as_str()).await {
            Ok((_, body)) if !body.trim().is_empty() => body,
            Ok(_) => {
                warn!(%url, "sitemap body is empty");
                return Err(FaqBotError::validation("Failed to fetch sitemapUrl"));
            }
            Err(e) => {
                warn!(%url, error = %e, "sitemap fetch failed");
                return Err(FaqBotError::validation("Failed to fetch sitemapUrl"));
            }
        },
    };

    let first = parse_sitemap(&xml);

    let page_urls = if !first.urls.is_empty() {
        // Uploaded files may carry no origin; keep everything then.
        first
            .urls
            .into_iter()
            .filter(|u| matches_origin(u, origin.as_deref()))
            .collect::<Vec<_>>()
    } else if !first.nested_sitemaps.is_empty() {
        if origin.is_none() {
            origin = origin_of(&first.nested_sitemaps[0]);
        }
        let start: Vec<String> = first
            .nested_sitemaps
            .into_iter()
            .filter(|u| matches_origin(u, origin.as_deref()))
            .collect();
        expand_sitemap_index(fetcher, start, origin.as_deref(), max_pages).await
    } else {
        return Err(FaqBotError::validation("Sitemap appears empty"));
    };

    let page_urls = dedupe(page_urls, max_pages);
    if page_urls.is_empty() {
        return Err(FaqBotError::validation("No page URLs found in sitemap"));
    }

    info!(pages = page_urls.len(), origin = ?origin, "sitemap discovered");
    Ok(SitemapDiscovery { origin, page_urls })
}

/// Expand sitemap index entries breadth-first until `cap` page URLs are found.
///
/// Each sitemap is fetched at most once; sitemaps that fail to fetch are
/// skipped. When `origin` is known, both page URLs and nested sitemaps must
/// belong to it.
pub async fn expand_sitemap_index(
    fetcher: &Fetcher,
    start: Vec<String>,
    origin: Option<&str>,
    cap: usize,
) -> Vec<String> {
    let mut queue: VecDeque<String> = start.into();
    let mut seen_sitemaps: HashSet<String> = HashSet::new();
    let mut seen_pages: HashSet<String> = HashSet::new();
    let mut collected: Vec<String> = Vec::new();

    while collected.len() < cap {
        let Some(sitemap_url) = queue.pop_front() else {
            break;
        };
        if !seen_sitemaps.insert(sitemap_url.clone()) {
            continue;
        }

        let xml = match fetcher.fetch_text(&sitemap_url).await {
            Ok((_, body)) => body,
            Err(e) => {
                warn!(%sitemap_url, error = %e, "nested sitemap fetch failed, skipping");
                continue;
            }
        };

        let parsed = parse_sitemap(&xml);
        debug!(
            %sitemap_url,
            urls = parsed.urls.len(),
            nested = parsed.nested_sitemaps.len(),
            "nested sitemap parsed"
        );

        for url in parsed.urls {
            if matches_origin(&url, origin) && seen_pages.insert(url.clone()) {
                collected.push(url);
                if collected.len() >= cap {
                    break;
                }
            }
        }
        if collected.len() >= cap {
            break;
        }

        for child in parsed.nested_sitemaps {
            if matches_origin(&child, origin) && !seen_sitemaps.contains(&child) {
                queue.push_back(child);
            }
        }
    }

    collected
}

/// Locate a sitemap for a bare site URL.
///
/// `Sitemap:` lines in `robots.txt` are tried first, then the conventional
/// `/sitemap.xml` and `/sitemap_index.xml` paths.
pub async fn find_sitemap(site_url: &Url, opts: &DiscoveryOptions) -> Result<Option<Url>> {
    let fetcher = Fetcher::new(&opts.fetch_options())?;
    Ok(find_sitemap_with(&fetcher, site_url).await)
}

/// [`find_sitemap`] using an existing fetcher.
#[instrument(skip_all, fields(site_url = %site_url))]
pub async fn find_sitemap_with(fetcher: &Fetcher, site_url: &Url) -> Option<Url> {
    let origin = origin_of(site_url.as_str())?;

    let mut candidates: Vec<String> = Vec::new();
    let robots_url = format!("{origin}/robots.txt");
    match fetcher.fetch_text(&robots_url).await {
        Ok((_, robots)) => candidates.extend(robots_sitemaps(&robots)),
        Err(e) => debug!(error = %e, "robots.txt not available"),
    }
    candidates.extend(WELL_KNOWN_SITEMAPS.iter().map(|p| format!("{origin}{p}")));

    for candidate in candidates {
        if fetcher.is_reachable(&candidate).await {
            info!(sitemap = %candidate, "sitemap found");
            return Url::parse(&candidate).ok();
        }
    }
    None
}

/// `Sitemap:` directives from a robots.txt body.
fn robots_sitemaps(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("sitemap")
                .then(|| value.trim().to_string())
        })
        .filter(|v| Url::parse(v).is_ok())
        .collect()
}

fn dedupe(urls: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_opts(max_pages: usize) -> DiscoveryOptions {
        DiscoveryOptions {
            max_pages,
            allow_localhost: true,
            ..DiscoveryOptions::default()
        }
    }

    fn urlset(urls: &[String]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
        )
    }

    fn index(sitemaps: &[String]) -> String {
        let entries: String = sitemaps
            .iter()
            .map(|u| format!("<sitemap><loc>{u}</loc></sitemap>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
        )
    }

    async fn serve(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn origin_helpers() {
        assert_eq!(
            origin_of("https://shop.example.com/a/b?c=1").as_deref(),
            Some("https://shop.example.com")
        );
        assert_eq!(
            origin_of("http://localhost:3000/docs").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(
            origin_of("https://shop.example.com:443/").as_deref(),
            Some("https://shop.example.com")
        );
        assert_eq!(origin_of("not a url"), None);

        assert!(is_same_origin("https://a.com/x", "https://a.com"));
        assert!(!is_same_origin("https://b.com/x", "https://a.com"));
        assert!(!is_same_origin("http://a.com/x", "https://a.com"));
        assert!(!is_same_origin("garbage", "https://a.com"));
    }

    #[test]
    fn source_from_parts() {
        let src = SitemapSource::from_parts(Some(" https://a.com/sitemap.xml "), None).unwrap();
        assert!(matches!(src, SitemapSource::Url(_)));

        let src = SitemapSource::from_parts(
            Some("https://a.com/sitemap.xml"),
            Some("<urlset/>".into()),
        )
        .unwrap();
        assert!(matches!(src, SitemapSource::UploadedWithUrl { .. }));
        assert_eq!(src.origin().as_deref(), Some("https://a.com"));

        let src = SitemapSource::from_parts(None, Some("<urlset/>".into())).unwrap();
        assert!(src.origin().is_none());

        // Blank upload falls back to the URL
        let src = SitemapSource::from_parts(Some("https://a.com/s.xml"), Some("  ".into())).unwrap();
        assert!(matches!(src, SitemapSource::Url(_)));

        let err = SitemapSource::from_parts(None, None).unwrap_err();
        assert_eq!(err.to_string(), "Provide sitemapUrl or upload sitemap.xml");

        let err = SitemapSource::from_parts(Some("::nope::"), None).unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch sitemapUrl");
    }

    #[test]
    fn robots_sitemap_lines() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://a.com/sm.xml\nsitemap:https://a.com/other.xml\nSitemap: nonsense";
        assert_eq!(
            robots_sitemaps(robots),
            vec!["https://a.com/sm.xml".to_string(), "https://a.com/other.xml".to_string()]
        );
    }

    #[tokio::test]
    async fn urlset_filters_other_origins() {
        let server = MockServer::start().await;
        let base = server.uri();
        serve(
            &server,
            "/sitemap.xml",
            urlset(&[
                format!("{base}/about"),
                "https://elsewhere.example.com/page".to_string(),
                format!("{base}/shipping"),
                format!("{base}/about"),
            ]),
        )
        .await;

        let source = SitemapSource::Url(Url::parse(&format!("{base}/sitemap.xml")).unwrap());
        let found = discover_pages(&source, &local_opts(50)).await.unwrap();

        assert_eq!(found.origin.as_deref(), Some(base.as_str()));
        assert_eq!(
            found.page_urls,
            vec![format!("{base}/about"), format!("{base}/shipping")]
        );
    }

    #[tokio::test]
    async fn uploaded_urlset_without_origin_keeps_everything() {
        let xml = urlset(&[
            "https://a.example.com/one".to_string(),
            "https://b.example.com/two".to_string(),
        ]);
        let found = discover_pages(&SitemapSource::Uploaded(xml), &local_opts(50))
            .await
            .unwrap();
        assert!(found.origin.is_none());
        assert_eq!(found.page_urls.len(), 2);
    }

    #[tokio::test]
    async fn index_is_expanded_breadth_first_and_capped() {
        let server = MockServer::start().await;
        let base = server.uri();

        serve(
            &server,
            "/sitemap_index.xml",
            index(&[
                format!("{base}/sitemap-a.xml"),
                format!("{base}/sitemap-missing.xml"),
                format!("{base}/sitemap-b.xml"),
                "https://elsewhere.example.com/sitemap.xml".to_string(),
            ]),
        )
        .await;
        serve(
            &server,
            "/sitemap-a.xml",
            urlset(&[format!("{base}/a1"), format!("{base}/a2")]),
        )
        .await;
        serve(
            &server,
            "/sitemap-b.xml",
            urlset(&[format!("{base}/b1"), format!("{base}/b2"), format!("{base}/b3")]),
        )
        .await;

        let source =
            SitemapSource::Url(Url::parse(&format!("{base}/sitemap_index.xml")).unwrap());

        let found = discover_pages(&source, &local_opts(50)).await.unwrap();
        assert_eq!(found.page_urls.len(), 5);
        assert_eq!(found.page_urls[0], format!("{base}/a1"));

        let capped = discover_pages(&source, &local_opts(3)).await.unwrap();
        assert_eq!(
            capped.page_urls,
            vec![format!("{base}/a1"), format!("{base}/a2"), format!("{base}/b1")]
        );
    }

    #[tokio::test]
    async fn nested_indexes_are_visited_once() {
        let server = MockServer::start().await;
        let base = server.uri();

        serve(
            &server,
            "/root.xml",
            index(&[format!("{base}/child.xml"), format!("{base}/child.xml")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/child.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(index(&[format!("{base}/root.xml"), format!("{base}/leaf.xml")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        serve(&server, "/leaf.xml", urlset(&[format!("{base}/page")])).await;

        let source = SitemapSource::Url(Url::parse(&format!("{base}/root.xml")).unwrap());
        let found = discover_pages(&source, &local_opts(50)).await.unwrap();
        assert_eq!(found.page_urls, vec![format!("{base}/page")]);
    }

    #[tokio::test]
    async fn uploaded_index_infers_origin_from_first_child() {
        let server = MockServer::start().await;
        let base = server.uri();
        serve(
            &server,
            "/pages.xml",
            urlset(&[format!("{base}/x"), "https://elsewhere.example.com/y".to_string()]),
        )
        .await;

        let xml = index(&[format!("{base}/pages.xml")]);
        let found = discover_pages(&SitemapSource::Uploaded(xml), &local_opts(50))
            .await
            .unwrap();
        assert_eq!(found.origin.as_deref(), Some(base.as_str()));
        assert_eq!(found.page_urls, vec![format!("{base}/x")]);
    }

    #[tokio::test]
    async fn failure_messages() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/gone.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        serve(&server, "/empty.xml", "<html><body>hello</body></html>".to_string()).await;
        serve(
            &server,
            "/foreign.xml",
            urlset(&["https://elsewhere.example.com/a".to_string()]),
        )
        .await;

        let opts = local_opts(50);
        let src = |p: &str| SitemapSource::Url(Url::parse(&format!("{base}{p}")).unwrap());

        let err = discover_pages(&src("/gone.xml"), &opts).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch sitemapUrl");

        let err = discover_pages(&src("/empty.xml"), &opts).await.unwrap_err();
        assert_eq!(err.to_string(), "Sitemap appears empty");

        let err = discover_pages(&src("/foreign.xml"), &opts).await.unwrap_err();
        assert_eq!(err.to_string(), "No page URLs found in sitemap");
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn find_sitemap_prefers_robots() {
        let server = MockServer::start().await;
        let base = server.uri();
        serve(
            &server,
            "/robots.txt",
            format!("User-agent: *\nSitemap: {base}/custom-sitemap.xml\n"),
        )
        .await;
        serve(&server, "/custom-sitemap.xml", urlset(&[format!("{base}/a")])).await;
        serve(&server, "/sitemap.xml", urlset(&[format!("{base}/b")])).await;

        let site = Url::parse(&format!("{base}/some/page")).unwrap();
        let found = find_sitemap(&site, &local_opts(50)).await.unwrap();
        assert_eq!(
            found.map(|u| u.to_string()),
            Some(format!("{base}/custom-sitemap.xml"))
        );
    }

    #[tokio::test]
    async fn find_sitemap_falls_back_to_well_known_paths() {
        let server = MockServer::start().await;
        let base = server.uri();
        serve(&server, "/sitemap_index.xml", index(&[])).await;

        let site = Url::parse(&base).unwrap();
        let found = find_sitemap(&site, &local_opts(50)).await.unwrap();
        assert_eq!(
            found.map(|u| u.to_string()),
            Some(format!("{base}/sitemap_index.xml"))
        );

        let empty = MockServer::start().await;
        let site = Url::parse(&empty.uri()).unwrap();
        assert!(find_sitemap(&site, &local_opts(50)).await.unwrap().is_none());
    }
}
