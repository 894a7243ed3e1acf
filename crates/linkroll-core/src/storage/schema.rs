//! SQLite schema for the link store
//!
//! Three structures, kept consistent by running every multi-key mutation
//! inside one transaction:
//!
//! - `link_fields` - the record store, one row per (link, field)
//! - `url_index` - uniqueness set over live URLs
//! - `date_index` - chronological index, link id to fractional epoch seconds

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Record store: mapping of field name to string value per link
        CREATE TABLE IF NOT EXISTS link_fields (
            link_id TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (link_id, field)
        );

        -- Uniqueness index: a URL is present iff a live record holds it
        CREATE TABLE IF NOT EXISTS url_index (
            url TEXT PRIMARY KEY
        );

        -- Chronological index: a link id is present iff its record exists
        CREATE TABLE IF NOT EXISTS date_index (
            link_id TEXT PRIMARY KEY,
            score REAL NOT NULL
        );

        -- Ranged listing walks the score order
        CREATE INDEX IF NOT EXISTS idx_date_index_score ON date_index(score);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
