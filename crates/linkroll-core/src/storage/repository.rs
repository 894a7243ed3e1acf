//! SQLite-backed record store and secondary indexes
//!
//! Every mutation that touches more than one structure runs inside a single
//! transaction, so no reader ever observes a record present in only a subset
//! of the record store, the URL index, and the chronological index.
//! Duplicate-URL checks happen inside the same transaction as the writes
//! they guard.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::models::{fields, LinkRecord};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema::{init_schema, needs_init};

/// Persistent store for link records and their two indexes
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Check whether a URL is currently held by some live record
    pub fn url_exists(&self, url: &str) -> StoreResult<bool> {
        url_taken(&self.conn, url)
    }

    /// Insert a new record plus both index entries as one atomic batch
    ///
    /// Fails with `DuplicateUrl` and performs no mutation when the URL is
    /// already indexed.
    pub fn insert(&mut self, record: &LinkRecord) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        if url_taken(&tx, &record.url_address)? {
            return Err(StoreError::DuplicateUrl {
                url: record.url_address.clone(),
            });
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO link_fields (link_id, field, value) VALUES (?1, ?2, ?3)",
            )?;
            for (field, value) in record.to_fields() {
                stmt.execute(params![record.link_id, field, value])?;
            }
        }

        tx.execute(
            "INSERT INTO url_index (url) VALUES (?1)",
            params![record.url_address],
        )?;
        tx.execute(
            "INSERT INTO date_index (link_id, score) VALUES (?1, ?2)",
            params![record.link_id, record.score()],
        )?;

        tx.commit()?;
        debug!(link_id = %record.link_id, "record inserted");
        Ok(())
    }

    /// Merge changed fields into a record, optionally swapping URL-index
    /// membership, as one atomic batch
    ///
    /// When `url_swap` is given, the new URL's availability is checked inside
    /// the same transaction; `DuplicateUrl` rolls everything back.
    pub fn apply_patch(
        &mut self,
        link_id: &str,
        changed: &BTreeMap<String, String>,
        url_swap: Option<(&str, &str)>,
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        if let Some((old_url, new_url)) = url_swap {
            if url_taken(&tx, new_url)? {
                return Err(StoreError::DuplicateUrl {
                    url: new_url.to_string(),
                });
            }
            tx.execute("DELETE FROM url_index WHERE url = ?1", params![old_url])?;
            tx.execute("INSERT INTO url_index (url) VALUES (?1)", params![new_url])?;
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO link_fields (link_id, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(link_id, field) DO UPDATE SET value = excluded.value",
            )?;
            for (field, value) in changed {
                stmt.execute(params![link_id, field, value])?;
            }
        }

        tx.commit()?;
        debug!(link_id, changed = changed.len(), "record patched");
        Ok(())
    }

    /// Remove a record together with both index entries
    ///
    /// Returns whether a record was actually removed.
    pub fn remove(&mut self, link_id: &str) -> StoreResult<bool> {
        let tx = self.conn.transaction()?;

        let url: Option<String> = tx
            .query_row(
                "SELECT value FROM link_fields WHERE link_id = ?1 AND field = ?2",
                params![link_id, fields::URL_ADDRESS],
                |row| row.get(0),
            )
            .optional()?;

        let Some(url) = url else {
            return Ok(false);
        };

        tx.execute("DELETE FROM url_index WHERE url = ?1", params![url])?;
        tx.execute("DELETE FROM date_index WHERE link_id = ?1", params![link_id])?;
        tx.execute("DELETE FROM link_fields WHERE link_id = ?1", params![link_id])?;

        tx.commit()?;
        debug!(link_id, "record removed");
        Ok(true)
    }

    /// Fetch a full record
    pub fn get(&self, link_id: &str) -> StoreResult<Option<LinkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT field, value FROM link_fields WHERE link_id = ?1")?;

        let mut map = BTreeMap::new();
        let rows = stmt.query_map(params![link_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (field, value) = row?;
            map.insert(field, value);
        }

        Ok(LinkRecord::from_fields(&map))
    }

    /// Fetch a single field; `None` when the record or the field is missing
    pub fn get_field(&self, link_id: &str, field: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM link_fields WHERE link_id = ?1 AND field = ?2",
                params![link_id, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Check whether a record exists
    pub fn exists(&self, link_id: &str) -> StoreResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM link_fields WHERE link_id = ?1")?;
        Ok(stmt.exists(params![link_id])?)
    }

    /// Cardinality of the chronological index
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM date_index", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Link identifiers over the inclusive rank range `[start, stop]`,
    /// most-recently-created first
    ///
    /// Negative indices count from the end. Equal scores order by link id,
    /// so listings are deterministic.
    pub fn list(&self, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let count = self.count()? as i64;

        let mut start = if start < 0 { count + start } else { start };
        let mut stop = if stop < 0 { count + stop } else { stop };
        start = start.max(0);
        stop = stop.min(count - 1);

        if count == 0 || start > stop || start >= count {
            return Ok(Vec::new());
        }

        let limit = stop - start + 1;
        let mut stmt = self.conn.prepare(
            "SELECT link_id FROM date_index
             ORDER BY score DESC, link_id DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let ids = stmt
            .query_map(params![limit, start], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn url_taken(conn: &Connection, url: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM url_index WHERE url = ?1")?;
    Ok(stmt.exists(params![url])?)
}
