//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use sharegate_common::{Error, Result};

/// V1: the shares table.
///
/// Timestamps are RFC 3339 UTC strings with a fixed width, so string
/// comparison orders them chronologically.
const V1_SHARES: &str = r#"
CREATE TABLE shares (
    token           TEXT PRIMARY KEY NOT NULL,
    backend         TEXT NOT NULL CHECK (backend IN ('scene_server', 'library_server')),
    scene_id        TEXT,
    resolution      TEXT,
    item_id         TEXT,
    media_source_id TEXT,
    display_name    TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    max_views       INTEGER CHECK (max_views IS NULL OR max_views > 0),
    views           INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
    allowed_ips     TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL,
    CHECK (
        (backend = 'scene_server' AND scene_id IS NOT NULL AND resolution IS NOT NULL)
        OR
        (backend = 'library_server' AND item_id IS NOT NULL AND media_source_id IS NOT NULL)
    )
);

CREATE INDEX idx_shares_expires_at ON shares(expires_at);
CREATE INDEX idx_shares_created_at ON shares(created_at);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_SHARES)];

/// Run all pending migrations.
///
/// Creates the `schema_migrations` bookkeeping table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::debug!(version, "Applied migration");
    }

    Ok(())
}
