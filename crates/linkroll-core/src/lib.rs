//! linkroll core library
//!
//! Stores user-submitted link bookmarks and notifies interested consumers
//! whenever a link is added, changed, removed, or read.
//!
//! # Architecture
//!
//! - **Storage**: SQLite holds the record store, a uniqueness index on
//!   URL, and a chronological index for listing. Every multi-key mutation
//!   runs in one transaction, so no reader observes a partial result.
//! - **Events**: a resilient AMQP producer delivers durable job messages
//!   (at-least-once intent) and ephemeral broadcast log messages, with
//!   bounded quadratic-backoff reconnect.
//!
//! # Quick Start
//!
//! ```ignore
//! let mut store = LinkStore::open(Config::load()?).await?;
//!
//! let id = store
//!     .add(NewLink::new("Example", "A page", "https://example.com", "u1"))
//!     .await?;
//!
//! let newest_first = store.list_links(0, -1).await?;
//! ```
//!
//! # Modules
//!
//! - `store`: unified store interface (main entry point)
//! - `models`: link records, creation payloads, field patches
//! - `storage`: SQLite repository, schema, and error taxonomy
//! - `events`: event messages, publisher state machine, broker transport
//! - `config`: application configuration

pub mod config;
pub mod events;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use events::{
    Action, AmqpTransport, BrokerChannel, BrokerTransport, EventPublisher, EventSink, JobMessage,
    LogMessage, NoopSink, PublishError, PublisherStatus, RetryPolicy, TransportError,
};
pub use models::{LinkPatch, LinkRecord, NewLink};
pub use storage::{Repository, StoreError, StoreResult};
pub use store::LinkStore;
