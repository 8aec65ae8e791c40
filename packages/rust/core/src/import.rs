//! Site import: sitemap → URLs → fetch → extract → chunk → embed → store.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};
use url::Url;

use faqbot_crawler::{FetchOptions, Fetcher};
use faqbot_discovery::{SitemapSource, discover_pages_with, find_sitemap_with, is_same_origin, origin_of};
use faqbot_shared::{ChunkRow, FaqBotError, ImportConfig, PageRecord, Result, new_id};
use faqbot_storage::Storage;

use crate::chunk::chunk_text;
use crate::context::AppContext;
use crate::openai::OpenAiClient;

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// Parameters of one import run.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub tenant_id: String,
    pub source: SitemapSource,
    /// Requested page cap; clamped to the configured range.
    pub max_pages: Option<u32>,
    /// Re-index pages even when their text is unchanged.
    pub force: bool,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Pages fetched successfully.
    pub pages: usize,
    /// Chunk rows written.
    pub chunks: usize,
    /// Pages skipped because their text hash matched the stored one.
    pub unchanged: usize,
    /// Pages skipped for other reasons (other origin, fetch failure, no text).
    pub skipped: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting import status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a page's chunks are stored.
    fn page_indexed(&self, url: &str, current: usize, total: usize, chunks: usize);
    /// Called when a page is passed over.
    fn page_skipped(&self, url: &str, reason: &str);
    /// Called when the import completes.
    fn done(&self, result: &ImportResult);
}

/// No-op progress reporter for server and test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_indexed(&self, _url: &str, _current: usize, _total: usize, _chunks: usize) {}
    fn page_skipped(&self, _url: &str, _reason: &str) {}
    fn done(&self, _result: &ImportResult) {}
}

/// Fetcher settings derived from the `[import]` config section.
pub fn fetch_options(config: &ImportConfig) -> FetchOptions {
    FetchOptions {
        timeout_secs: config.fetch_timeout_secs,
        user_agent: config.user_agent.clone(),
        allow_localhost: config.allow_private_hosts,
    }
}

/// Locate the sitemap of a bare site URL.
pub async fn resolve_site_source(ctx: &AppContext, site_url: &str) -> Result<SitemapSource> {
    let site = Url::parse(site_url.trim())
        .map_err(|_| FaqBotError::validation(format!("Invalid site URL: {site_url}")))?;
    let fetcher = Fetcher::new(&fetch_options(&ctx.config.import))?;

    match find_sitemap_with(&fetcher, &site).await {
        Some(sitemap) => Ok(SitemapSource::Url(sitemap)),
        None => Err(FaqBotError::validation(format!("No sitemap found for {site}"))),
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the import pipeline for one tenant.
///
/// 1. Validate the tenant and clamp the page cap
/// 2. Check the subscription when required
/// 3. Discover page URLs from the sitemap
/// 4. Fetch, extract, chunk, embed and store each page in turn
/// 5. Record the import job
#[instrument(skip_all, fields(tenant_id = %req.tenant_id.trim(), source = %req.source.label()))]
pub async fn run_import(
    ctx: &AppContext,
    req: &ImportRequest,
    progress: &dyn ProgressReporter,
) -> Result<ImportResult> {
    let start = Instant::now();
    let tenant_id = req.tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(FaqBotError::validation("tenantId is required"));
    }

    let config = &ctx.config.import;
    let max_pages = config.clamp_max_pages(req.max_pages);

    if config.require_subscription && !ctx.storage.has_active_subscription(tenant_id).await? {
        return Err(FaqBotError::validation("No active subscription."));
    }

    let openai = ctx.openai()?;
    let fetcher = Fetcher::new(&fetch_options(config))?;

    // --- Phase 1: Discovery ---
    progress.phase("Reading sitemap");
    let discovery = discover_pages_with(&fetcher, &req.source, max_pages as usize).await?;
    let base_origin = discovery
        .origin
        .clone()
        .or_else(|| discovery.page_urls.first().and_then(|u| origin_of(u)));

    let job_id = ctx
        .storage
        .insert_import_job(tenant_id, &req.source.label())
        .await?;

    // --- Phase 2: Crawl and index ---
    progress.phase("Indexing pages");
    let total = discovery.page_urls.len();
    let mut result = ImportResult::default();

    let crawl = async {
        for (i, url) in discovery.page_urls.iter().enumerate() {
            if !base_origin.as_deref().is_some_and(|o| is_same_origin(url, o)) {
                result.skipped += 1;
                progress.page_skipped(url, "other origin");
                continue;
            }

            let Some(page) = fetcher.fetch_or_skip(url).await else {
                result.skipped += 1;
                progress.page_skipped(url, "fetch failed");
                continue;
            };
            result.pages += 1;

            if page.text.is_empty() {
                result.skipped += 1;
                progress.page_skipped(url, "no text");
                continue;
            }

            if !req.force {
                if let Some(existing) = ctx.storage.get_page(tenant_id, url).await? {
                    if existing.content_hash == page.content_hash {
                        result.unchanged += 1;
                        progress.page_skipped(url, "unchanged");
                        continue;
                    }
                }
            }

            let chunks = chunk_text(&page.text, config.chunk_size, config.chunk_overlap);
            if chunks.is_empty() {
                result.skipped += 1;
                progress.page_skipped(url, "no text");
                continue;
            }

            let inserted = index_page(
                &ctx.storage,
                openai,
                tenant_id,
                url,
                &chunks,
                config.embed_batch_size,
            )
            .await?;
            result.chunks += inserted;

            // A partially stored page keeps no hash so the next run retries it.
            let content_hash = if inserted == chunks.len() {
                page.content_hash.clone()
            } else {
                String::new()
            };
            ctx.storage
                .upsert_page(&PageRecord {
                    id: new_id(),
                    tenant_id: tenant_id.to_string(),
                    url: url.clone(),
                    content_hash,
                    fetched_at: Utc::now(),
                    chunk_count: inserted,
                })
                .await?;

            info!(%url, chunks = chunks.len(), inserted, "page indexed");
            progress.page_indexed(url, i + 1, total, inserted);
        }
        Ok::<(), FaqBotError>(())
    }
    .await;

    result.elapsed = start.elapsed();

    // The job is closed even when the crawl failed part way.
    let mut stats = serde_json::json!({
        "pages": result.pages,
        "chunks": result.chunks,
        "unchanged": result.unchanged,
        "skipped": result.skipped,
        "elapsed_ms": result.elapsed.as_millis() as u64,
    });
    if let Err(e) = &crawl {
        stats["error"] = serde_json::Value::String(e.to_string());
    }
    if let Err(e) = ctx.storage.finish_import_job(&job_id, &stats.to_string()).await {
        warn!(%job_id, error = %e, "failed to record import stats");
    }

    if let Err(e) = crawl {
        warn!(%job_id, pages = result.pages, error = %e, "import aborted");
        return Err(e);
    }

    info!(
        pages = result.pages,
        chunks = result.chunks,
        unchanged = result.unchanged,
        skipped = result.skipped,
        elapsed_ms = result.elapsed.as_millis(),
        "import completed"
    );
    progress.done(&result);

    Ok(result)
}

/// Embed a page's chunks and replace its stored rows. Returns rows written.
///
/// All batches are embedded before the old rows are removed, so an
/// embedding failure leaves the previous index of the page intact.
async fn index_page(
    storage: &Storage,
    openai: &OpenAiClient,
    tenant_id: &str,
    url: &str,
    chunks: &[String],
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Vec<ChunkRow>> = Vec::new();

    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let offset = batch_no * batch_size;
        let vectors = openai.embed(batch).await?;

        batches.push(
            batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(j, (content, embedding))| ChunkRow {
                    tenant_id: tenant_id.to_string(),
                    url: url.to_string(),
                    chunk_index: offset + j,
                    content: content.clone(),
                    embedding,
                })
                .collect(),
        );
    }

    storage.delete_chunks_for_url(tenant_id, url).await?;

    let mut inserted = 0;
    for rows in batches {
        match storage.insert_chunks(&rows).await {
            Ok(n) => inserted += n,
            Err(e) => warn!(%url, error = %e, "chunk insert failed, skipping batch"),
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mock_embeddings, test_context};
    use faqbot_shared::{Subscription, SubscriptionStatus};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records skip reasons for assertions.
    #[derive(Default)]
    struct RecordingProgress {
        skipped: Mutex<Vec<(String, String)>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn page_indexed(&self, _url: &str, _current: usize, _total: usize, _chunks: usize) {}
        fn page_skipped(&self, url: &str, reason: &str) {
            self.skipped
                .lock()
                .unwrap()
                .push((url.to_string(), reason.to_string()));
        }
        fn done(&self, _result: &ImportResult) {}
    }

    async fn serve(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    /// Site with a sitemap listing two content pages, one empty page,
    /// one missing page and one page on another origin.
    async fn mock_site(server: &MockServer) -> SitemapSource {
        let base = server.uri();
        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{base}/shipping</loc></url><url><loc>{base}/returns</loc></url><url><loc>{base}/blank</loc></url><url><loc>{base}/missing</loc></url><url><loc>https://elsewhere.example.com/x</loc></url></urlset>"#
        );
        serve(server, "/sitemap.xml", sitemap).await;
        serve(
            server,
            "/shipping",
            "<html><body><h1>Shipping</h1><p>We ship worldwide within 2 days.</p></body></html>".into(),
        )
        .await;
        serve(
            server,
            "/returns",
            "<html><body><p>Returns are accepted within 30 days.</p><script>x()</script></body></html>".into(),
        )
        .await;
        serve(server, "/blank", "<html><body><script>only()</script></body></html>".into()).await;

        SitemapSource::Url(Url::parse(&format!("{base}/sitemap.xml")).unwrap())
    }

    fn request(source: SitemapSource, force: bool) -> ImportRequest {
        ImportRequest {
            tenant_id: "tenant-a".into(),
            source,
            max_pages: None,
            force,
        }
    }

    #[tokio::test]
    async fn imports_pages_and_skips_unusable_ones() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        let source = mock_site(&server).await;
        mock_embeddings(&server, 0).await;

        let progress = RecordingProgress::default();
        let result = run_import(&ctx, &request(source, false), &progress)
            .await
            .unwrap();

        // shipping, returns and blank were fetched; missing failed; other origin filtered
        assert_eq!(result.pages, 3);
        assert_eq!(result.chunks, 2);
        assert_eq!(result.unchanged, 0);
        assert_eq!(result.skipped, 2);

        // The foreign URL is dropped during discovery, so it never reaches the crawl loop.
        let reasons: Vec<String> = progress
            .skipped
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect();
        assert_eq!(reasons, vec!["no text".to_string(), "fetch failed".to_string()]);

        assert_eq!(ctx.storage.count_chunks("tenant-a").await.unwrap(), 2);
        let pages = ctx.storage.list_pages("tenant-a").await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.chunk_count == 1 && !p.content_hash.is_empty()));
    }

    #[tokio::test]
    async fn reimport_skips_unchanged_unless_forced() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        let source = mock_site(&server).await;
        mock_embeddings(&server, 0).await;

        run_import(&ctx, &request(source.clone(), false), &SilentProgress)
            .await
            .unwrap();

        let second = run_import(&ctx, &request(source.clone(), false), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.chunks, 0);
        assert_eq!(ctx.storage.count_chunks("tenant-a").await.unwrap(), 2);

        let forced = run_import(&ctx, &request(source, true), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(forced.unchanged, 0);
        assert_eq!(forced.chunks, 2);
        // Old rows were replaced, not duplicated
        assert_eq!(ctx.storage.count_chunks("tenant-a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn long_pages_are_chunked_with_running_indexes() {
        let server = MockServer::start().await;
        let mut ctx = test_context(&server).await;
        ctx.config.import.chunk_size = 4;
        ctx.config.import.chunk_overlap = 0;
        ctx.config.import.embed_batch_size = 2;

        let base = server.uri();
        let words: Vec<String> = (0..10).map(|i| format!("word{i}")).collect();
        serve(&server, "/long", format!("<html><body><p>{}</p></body></html>", words.join(" "))).await;
        mock_embeddings(&server, 1).await;

        let xml = format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{base}/long</loc></url></urlset>"#
        );
        let result = run_import(&ctx, &request(SitemapSource::Uploaded(xml), false), &SilentProgress)
            .await
            .unwrap();

        // 10 words in windows of 4 → 3 chunks over 2 embedding batches
        assert_eq!(result.chunks, 3);
        let page = ctx
            .storage
            .get_page("tenant-a", &format!("{base}/long"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.chunk_count, 3);
    }

    #[tokio::test]
    async fn validation_and_subscription_gate() {
        let server = MockServer::start().await;
        let mut ctx = test_context(&server).await;
        let source = mock_site(&server).await;
        mock_embeddings(&server, 0).await;

        let mut req = request(source.clone(), false);
        req.tenant_id = "  ".into();
        let err = run_import(&ctx, &req, &SilentProgress).await.unwrap_err();
        assert_eq!(err.to_string(), "tenantId is required");

        ctx.config.import.require_subscription = true;
        let err = run_import(&ctx, &request(source.clone(), false), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No active subscription.");

        ctx.storage
            .upsert_subscription(&Subscription {
                tenant_id: "tenant-a".into(),
                status: SubscriptionStatus::Active,
                stripe_customer_id: None,
                stripe_session_id: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let result = run_import(&ctx, &request(source, false), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.chunks, 2);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_and_keeps_previous_rows() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        let source = mock_site(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("{}"))
            .mount(&server)
            .await;

        let err = run_import(&ctx, &request(source, false), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "language model error: Embedding failed");
        assert_eq!(ctx.storage.count_chunks("tenant-a").await.unwrap(), 0);

        // The job is still closed, with the failure recorded.
        let job_id = ctx
            .storage
            .latest_import_job("tenant-a")
            .await
            .unwrap()
            .expect("job recorded");
        let stats = ctx
            .storage
            .get_import_job_stats(&job_id)
            .await
            .unwrap()
            .expect("job finished");
        let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(stats["error"], "language model error: Embedding failed");
        assert_eq!(stats["chunks"], 0);
    }

    #[tokio::test]
    async fn successful_import_records_stats_without_error() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        let source = mock_site(&server).await;
        mock_embeddings(&server, 0).await;

        run_import(&ctx, &request(source, false), &SilentProgress)
            .await
            .unwrap();

        let job_id = ctx.storage.latest_import_job("tenant-a").await.unwrap().unwrap();
        let stats = ctx.storage.get_import_job_stats(&job_id).await.unwrap().unwrap();
        let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(stats["chunks"], 2);
        assert!(stats.get("error").is_none());
    }

    #[tokio::test]
    async fn page_cap_is_clamped() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        let source = mock_site(&server).await;
        mock_embeddings(&server, 0).await;

        let mut req = request(source, false);
        req.max_pages = Some(1);
        let result = run_import(&ctx, &req, &SilentProgress).await.unwrap();
        assert_eq!(result.pages, 1);
        assert_eq!(result.chunks, 1);
    }

    #[tokio::test]
    async fn site_url_resolves_to_sitemap() {
        let server = MockServer::start().await;
        let ctx = test_context(&server).await;
        mock_site(&server).await;

        let source = resolve_site_source(&ctx, &server.uri()).await.unwrap();
        assert_eq!(source.label(), format!("{}/sitemap.xml", server.uri()));

        let empty = MockServer::start().await;
        let err = resolve_site_source(&ctx, &empty.uri()).await.unwrap_err();
        assert!(err.is_validation());
    }
}
