//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: feedback and learned patterns.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Feedback and learned patterns");

    // Staff verdicts on escalated requests
    conn.execute(
        "CREATE TABLE IF NOT EXISTS human_feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id TEXT NOT NULL,
            requester_id TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            ai_decision TEXT NOT NULL,
            ai_confidence REAL,
            ai_reason TEXT,
            human_decision TEXT NOT NULL,
            human_reason TEXT NOT NULL DEFAULT '',
            staff_username TEXT,
            snapshot TEXT NOT NULL,
            learning_applied INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Batch learning scans un-applied rows only
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_learning_applied
         ON human_feedback (learning_applied)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_request_id ON human_feedback (request_id)",
        [],
    )?;

    // One counter per (type, value, decision)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS learned_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern_type TEXT NOT NULL,
            pattern_value TEXT NOT NULL,
            decision TEXT NOT NULL,
            occurrences INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (pattern_type, pattern_value, decision)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_patterns_lookup
         ON learned_patterns (pattern_type, pattern_value)",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: review queue and requester statistics.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: Review queue and requester statistics");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pending_reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            reason TEXT NOT NULL,
            confidence REAL NOT NULL,
            path TEXT NOT NULL,
            snapshot TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            feedback_id INTEGER REFERENCES human_feedback(id) ON DELETE SET NULL,
            resolved_by TEXT,
            resolved_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reviews_status ON pending_reviews (status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS requester_stats (
            requester_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT '',
            total_requests INTEGER NOT NULL DEFAULT 0,
            approved_count INTEGER NOT NULL DEFAULT 0,
            rejected_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    Ok(())
}
