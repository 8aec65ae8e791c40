//! libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding tenant FAQs, crawled
//! page bookkeeping, page chunks with their embeddings, import jobs, and
//! subscriptions. Similarity search runs inside the database through libSQL's
//! native vector functions (`vector32`, `vector_distance_cos`).
//!
//! **Access rules:**
//! - Server and CLI imports: read-write via [`Storage::open`]
//! - Inspection tooling: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use faqbot_shared::{
    ChunkMatch, ChunkRow, EMBEDDING_DIMENSIONS, Faq, FaqBotError, PageRecord, Result,
    Subscription, SubscriptionStatus, new_id,
};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FaqBotError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FaqBotError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(FaqBotError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // FAQ operations
    // -----------------------------------------------------------------------

    /// Insert a question/answer pair for a tenant and return the stored row.
    pub async fn insert_faq(&self, tenant_id: &str, question: &str, answer: &str) -> Result<Faq> {
        self.check_writable()?;
        let faq = Faq {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO faqs (id, tenant_id, question, answer, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    faq.id.as_str(),
                    faq.tenant_id.as_str(),
                    faq.question.as_str(),
                    faq.answer.as_str(),
                    faq.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(faq)
    }

    /// List a tenant's FAQs, newest first, optionally capped at `limit` rows.
    pub async fn list_faqs(&self, tenant_id: &str, limit: Option<u32>) -> Result<Vec<Faq>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, question, answer, created_at
                 FROM faqs WHERE tenant_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                params![tenant_id, limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_faq(&row)?);
        }
        Ok(results)
    }

    /// Delete one FAQ. Returns `false` if no row of that tenant had the ID.
    pub async fn delete_faq(&self, tenant_id: &str, faq_id: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "DELETE FROM faqs WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, faq_id],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Count a tenant's FAQs.
    pub async fn count_faqs(&self, tenant_id: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM faqs WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Get the page record for a tenant's URL.
    pub async fn get_page(&self, tenant_id: &str, url: &str) -> Result<Option<PageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, url, content_hash, fetched_at, chunk_count
                 FROM pages WHERE tenant_id = ?1 AND url = ?2",
                params![tenant_id, url],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_page_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Upsert a page record (insert or update on conflict by `tenant_id + url`).
    pub async fn upsert_page(&self, page: &PageRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO pages (id, tenant_id, url, content_hash, fetched_at, chunk_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(tenant_id, url) DO UPDATE SET
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at,
                   chunk_count = excluded.chunk_count",
                params![
                    page.id.as_str(),
                    page.tenant_id.as_str(),
                    page.url.as_str(),
                    page.content_hash.as_str(),
                    page.fetched_at.to_rfc3339(),
                    page.chunk_count as i64,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List all page records for a tenant, ordered by URL.
    pub async fn list_pages(&self, tenant_id: &str) -> Result<Vec<PageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, url, content_hash, fetched_at, chunk_count
                 FROM pages WHERE tenant_id = ?1 ORDER BY url",
                params![tenant_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_page_record(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Chunk operations
    // -----------------------------------------------------------------------

    /// Insert chunk rows with their embeddings. Returns the number of rows written.
    pub async fn insert_chunks(&self, rows: &[ChunkRow]) -> Result<usize> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        for row in rows {
            check_dimensions(&row.embedding)?;
            let vector = vector_literal(&row.embedding)?;
            self.conn
                .execute(
                    "INSERT INTO page_chunks (id, tenant_id, url, chunk_index, content, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, vector32(?6), ?7)",
                    params![
                        new_id(),
                        row.tenant_id.as_str(),
                        row.url.as_str(),
                        row.chunk_index as i64,
                        row.content.as_str(),
                        vector,
                        now.as_str(),
                    ],
                )
                .await
                .map_err(db_err)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Remove every chunk previously stored for a tenant's URL.
    pub async fn delete_chunks_for_url(&self, tenant_id: &str, url: &str) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM page_chunks WHERE tenant_id = ?1 AND url = ?2",
                params![tenant_id, url],
            )
            .await
            .map_err(db_err)
    }

    /// Count the chunks stored for a tenant.
    pub async fn count_chunks(&self, tenant_id: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM page_chunks WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            None => Ok(0),
        }
    }

    /// Nearest chunks of a tenant to `query_embedding` by cosine distance.
    pub async fn match_page_chunks(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        match_count: u32,
    ) -> Result<Vec<ChunkMatch>> {
        check_dimensions(query_embedding)?;
        let vector = vector_literal(query_embedding)?;

        let mut rows = self
            .conn
            .query(
                "SELECT url, content, 1.0 - vector_distance_cos(embedding, vector32(?1)) AS similarity
                 FROM page_chunks
                 WHERE tenant_id = ?2
                 ORDER BY vector_distance_cos(embedding, vector32(?1)) ASC
                 LIMIT ?3",
                params![vector, tenant_id, i64::from(match_count)],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(ChunkMatch {
                url: row.get::<String>(0).map_err(db_err)?,
                content: row.get::<String>(1).map_err(db_err)?,
                similarity: row.get::<f64>(2).unwrap_or(0.0),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Import job operations
    // -----------------------------------------------------------------------

    /// Insert a new import job. Returns the generated job ID.
    pub async fn insert_import_job(&self, tenant_id: &str, source: &str) -> Result<String> {
        self.check_writable()?;
        let id = new_id();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO import_jobs (id, tenant_id, source, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), tenant_id, source, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Mark an import job finished with its stats.
    pub async fn finish_import_job(&self, job_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE import_jobs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, job_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Stats JSON of a finished job, `None` while the job is still running.
    pub async fn get_import_job_stats(&self, job_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM import_jobs WHERE id = ?1",
                params![job_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }

    /// Id of the tenant's most recently started import job.
    pub async fn latest_import_job(&self, tenant_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM import_jobs WHERE tenant_id = ?1 ORDER BY started_at DESC, id DESC LIMIT 1",
                params![tenant_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Subscription operations
    // -----------------------------------------------------------------------

    /// Record a tenant's subscription state (upserts by tenant).
    pub async fn upsert_subscription(&self, sub: &Subscription) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO subscriptions (tenant_id, status, stripe_customer_id, stripe_session_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                   status = excluded.status,
                   stripe_customer_id = COALESCE(excluded.stripe_customer_id, subscriptions.stripe_customer_id),
                   stripe_session_id = COALESCE(excluded.stripe_session_id, subscriptions.stripe_session_id),
                   updated_at = excluded.updated_at",
                params![
                    sub.tenant_id.as_str(),
                    sub.status.as_str(),
                    sub.stripe_customer_id.as_deref(),
                    sub.stripe_session_id.as_deref(),
                    sub.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a tenant's subscription, if one was ever recorded.
    pub async fn get_subscription(&self, tenant_id: &str) -> Result<Option<Subscription>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tenant_id, status, stripe_customer_id, stripe_session_id, updated_at
                 FROM subscriptions WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await
            .map_err(db_err)?;

        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };

        let status: String = row.get(1).map_err(db_err)?;
        Ok(Some(Subscription {
            tenant_id: row.get::<String>(0).map_err(db_err)?,
            status: status.parse().map_err(FaqBotError::Storage)?,
            stripe_customer_id: row.get::<String>(2).ok(),
            stripe_session_id: row.get::<String>(3).ok(),
            updated_at: parse_timestamp(&row.get::<String>(4).map_err(db_err)?)?,
        }))
    }

    /// Whether the tenant currently has an active subscription.
    pub async fn has_active_subscription(&self, tenant_id: &str) -> Result<bool> {
        Ok(self
            .get_subscription(tenant_id)
            .await?
            .is_some_and(|s| s.status == SubscriptionStatus::Active))
    }
}

fn db_err(e: libsql::Error) -> FaqBotError {
    FaqBotError::Storage(e.to_string())
}

fn check_dimensions(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIMENSIONS {
        return Err(FaqBotError::Storage(format!(
            "embedding has {} dimensions, expected {EMBEDDING_DIMENSIONS}",
            embedding.len()
        )));
    }
    Ok(())
}

/// Render an embedding as the JSON array text accepted by `vector32()`.
fn vector_literal(embedding: &[f32]) -> Result<String> {
    serde_json::to_string(embedding)
        .map_err(|e| FaqBotError::Storage(format!("failed to encode embedding: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FaqBotError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Faq`].
fn row_to_faq(row: &libsql::Row) -> Result<Faq> {
    Ok(Faq {
        id: row.get::<String>(0).map_err(db_err)?,
        tenant_id: row.get::<String>(1).map_err(db_err)?,
        question: row.get::<String>(2).map_err(db_err)?,
        answer: row.get::<String>(3).map_err(db_err)?,
        created_at: parse_timestamp(&row.get::<String>(4).map_err(db_err)?)?,
    })
}

/// Convert a database row to a [`PageRecord`].
fn row_to_page_record(row: &libsql::Row) -> Result<PageRecord> {
    Ok(PageRecord {
        id: row.get::<String>(0).map_err(db_err)?,
        tenant_id: row.get::<String>(1).map_err(db_err)?,
        url: row.get::<String>(2).map_err(db_err)?,
        content_hash: row.get::<String>(3).map_err(db_err)?,
        fetched_at: parse_timestamp(&row.get::<String>(4).map_err(db_err)?)?,
        chunk_count: row.get::<i64>(5).unwrap_or(0) as usize,
    })
}
