//! Storage error taxonomy
//!
//! `DuplicateUrl` is the only caller-recoverable failure; it is raised
//! before any mutation. Missing records and fields are never errors, the
//! read operations return `Option`/`bool` instead.

use thiserror::Error;

use crate::events::PublishError;

/// Errors surfaced by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The URL is already held by a live link record
    #[error("url is already bookmarked: {url}")]
    DuplicateUrl { url: String },

    /// SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event delivery failed after the publisher exhausted its recovery
    #[error("event publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl StoreError {
    pub fn is_duplicate_url(&self) -> bool {
        matches!(self, StoreError::DuplicateUrl { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
