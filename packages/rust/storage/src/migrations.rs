//! SQL migration definitions for the FAQBot database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: faqs, pages, page_chunks (vector), import_jobs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Tenant-authored question/answer pairs
CREATE TABLE IF NOT EXISTS faqs (
    id         TEXT PRIMARY KEY,
    tenant_id  TEXT NOT NULL,
    question   TEXT NOT NULL,
    answer     TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_faqs_tenant ON faqs(tenant_id, created_at);

-- One row per crawled page, used to skip unchanged pages on re-import
CREATE TABLE IF NOT EXISTS pages (
    id           TEXT PRIMARY KEY,
    tenant_id    TEXT NOT NULL,
    url          TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at   TEXT NOT NULL,
    chunk_count  INTEGER NOT NULL DEFAULT 0,
    UNIQUE(tenant_id, url)
);

-- Website text chunks with their embeddings
CREATE TABLE IF NOT EXISTS page_chunks (
    id          TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    url         TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content     TEXT NOT NULL,
    embedding   F32_BLOB(1536) NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_chunks_tenant ON page_chunks(tenant_id);
CREATE INDEX IF NOT EXISTS idx_page_chunks_tenant_url ON page_chunks(tenant_id, url);

-- Import history
CREATE TABLE IF NOT EXISTS import_jobs (
    id          TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    source      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_import_jobs_tenant ON import_jobs(tenant_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Subscriptions recorded from checkout webhooks",
            sql: r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    tenant_id          TEXT PRIMARY KEY,
    status             TEXT NOT NULL,
    stripe_customer_id TEXT,
    stripe_session_id  TEXT,
    updated_at         TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
