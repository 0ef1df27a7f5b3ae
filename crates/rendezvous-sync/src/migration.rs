//! Database schema migrations for the SQLite sync backend.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, SyncServiceError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely,
/// including concurrently from several processes opening the same file.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(&tx, version)?;

        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(SyncServiceError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per (run, state, participant); the primary key makes signals idempotent
        CREATE TABLE signals (
            run TEXT NOT NULL,
            state TEXT NOT NULL,
            participant BLOB NOT NULL,        -- 16 bytes, opaque participant key
            position INTEGER NOT NULL,        -- 1-based arrival order within (run, state)
            signaled_at INTEGER NOT NULL,     -- Unix ms
            PRIMARY KEY (run, state, participant),
            UNIQUE (run, state, position)
        );

        -- Append-only topic log
        CREATE TABLE topic_entries (
            run TEXT NOT NULL,
            topic TEXT NOT NULL,
            position INTEGER NOT NULL,        -- 1-based publish order within (run, topic)
            payload BLOB NOT NULL,
            published_at INTEGER NOT NULL,    -- Unix ms
            PRIMARY KEY (run, topic, position)
        );
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
