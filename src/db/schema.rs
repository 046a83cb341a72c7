//! SQL DDL for the topic index.
//!
//! Defines the `topics` and `schema_meta` tables. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Base schema (version 1).
const SCHEMA_SQL: &str = r#"
-- One row per topic cluster. Only the running mean and count are kept.
CREATE TABLE IF NOT EXISTS topics (
    topic_id TEXT PRIMARY KEY,
    storage_location TEXT NOT NULL UNIQUE,
    centroid BLOB NOT NULL,
    dimensions INTEGER NOT NULL CHECK(dimensions > 0),
    document_count INTEGER NOT NULL CHECK(document_count >= 1),
    title TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
