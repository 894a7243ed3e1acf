//! Storage layer
//!
//! A record store plus two secondary indexes, all in SQLite. The
//! transaction is the atomic batch: every mutation touching more than one
//! structure either lands completely or not at all.

pub mod error;
pub mod repository;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use repository::Repository;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
