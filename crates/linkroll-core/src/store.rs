//! Unified link store
//!
//! `LinkStore` coordinates the repository and the event sink: every
//! mutation lands as one atomic batch and then reports a domain event;
//! reads report log-only events when read telemetry is enabled.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = LinkStore::open(Config::load()?).await?;
//!
//! let id = store
//!     .add(NewLink::new("Example", "A page", "https://example.com", "u1"))
//!     .await?;
//! let record = store.get(&id).await?;
//! ```

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::events::{AmqpTransport, EventPublisher, EventSink, NoopSink};
use crate::models::{fields, LinkPatch, LinkRecord, NewLink};
use crate::storage::{Repository, StoreResult};

/// Link bookmark store with event publishing
pub struct LinkStore<S: EventSink> {
    repo: Repository,
    events: S,
    publish_reads: bool,
}

impl LinkStore<EventPublisher<AmqpTransport>> {
    /// Open the store and connect its publisher to the broker
    pub async fn open(config: Config) -> Result<Self> {
        let repo = Repository::open(&config.sqlite_path())
            .with_context(|| format!("Failed to open database at {:?}", config.sqlite_path()))?;

        let mut publisher = EventPublisher::amqp(&config.amqp_url, config.retry_policy());
        publisher
            .connect()
            .await
            .with_context(|| format!("Failed to connect to broker at {}", config.amqp_url))?;

        Ok(Self {
            repo,
            events: publisher,
            publish_reads: config.publish_reads,
        })
    }

    /// Close the broker connection
    pub async fn close(&mut self) -> Result<()> {
        self.events.close().await.context("Failed to close broker connection")
    }
}

impl LinkStore<NoopSink> {
    /// Store without a broker; events are dropped
    pub fn open_without_broker(config: Config) -> Result<Self> {
        let repo = Repository::open(&config.sqlite_path())
            .with_context(|| format!("Failed to open database at {:?}", config.sqlite_path()))?;
        Ok(Self::with_parts(repo, NoopSink))
    }
}

impl<S: EventSink> LinkStore<S> {
    /// Assemble a store from an open repository and a sink
    pub fn with_parts(repo: Repository, events: S) -> Self {
        Self {
            repo,
            events,
            publish_reads: true,
        }
    }

    /// Control whether read operations publish `viewed:*` log events
    pub fn publish_reads(mut self, enabled: bool) -> Self {
        self.publish_reads = enabled;
        self
    }

    /// Create a link
    ///
    /// Assigns the identifier and, when absent, the creation timestamp.
    /// Fails with `DuplicateUrl` and performs no mutation when the URL is
    /// already bookmarked.
    pub async fn add(&mut self, link: NewLink) -> StoreResult<String> {
        let record = link.into_record();
        self.repo.insert(&record)?;
        info!(link_id = %record.link_id, url = %record.url_address, "link added");
        self.events.added(&record.link_id).await?;
        Ok(record.link_id)
    }

    /// Merge changed fields into a link
    ///
    /// A URL change swaps index membership and merges the fields in one
    /// atomic batch; `DuplicateUrl` leaves everything untouched. Patching
    /// an absent link is a no-op.
    pub async fn modify(&mut self, link_id: &str, patch: LinkPatch) -> StoreResult<()> {
        let changed = patch.to_fields();
        if changed.is_empty() || !self.repo.exists(link_id)? {
            return Ok(());
        }

        // A patched URL equal to the current one needs no index swap
        let new_url = changed.get(fields::URL_ADDRESS);
        let old_url = match new_url {
            Some(new_url) => self
                .repo
                .get_field(link_id, fields::URL_ADDRESS)?
                .filter(|current| current != new_url),
            None => None,
        };
        let url_swap = old_url.as_deref().zip(new_url.map(String::as_str));

        self.repo.apply_patch(link_id, &changed, url_swap)?;
        info!(link_id, changed = changed.len(), "link modified");
        self.events.modified(link_id, &changed).await?;
        Ok(())
    }

    /// Remove a link and both index entries
    ///
    /// Removing an absent link is a no-op and emits nothing.
    pub async fn delete(&mut self, link_id: &str) -> StoreResult<()> {
        if self.repo.remove(link_id)? {
            info!(link_id, "link deleted");
            self.events.deleted(link_id).await?;
        }
        Ok(())
    }

    /// Fetch a full record
    pub async fn get(&mut self, link_id: &str) -> StoreResult<Option<LinkRecord>> {
        let record = self.repo.get(link_id)?;
        if self.publish_reads {
            self.events.viewed_link(link_id).await?;
        }
        Ok(record)
    }

    /// Fetch a single field; `None` when the record or field is missing
    pub async fn get_field(&mut self, link_id: &str, field: &str) -> StoreResult<Option<String>> {
        let value = self.repo.get_field(link_id, field)?;
        if self.publish_reads {
            self.events.viewed_field(link_id, field).await?;
        }
        Ok(value)
    }

    /// Check whether a link exists
    pub async fn exists(&mut self, link_id: &str) -> StoreResult<bool> {
        let exists = self.repo.exists(link_id)?;
        if self.publish_reads {
            self.events.viewed_exists(link_id, exists).await?;
        }
        Ok(exists)
    }

    /// Number of stored links
    pub fn count_links(&self) -> StoreResult<u64> {
        self.repo.count()
    }

    /// Link identifiers over the inclusive rank range `[start, stop]`,
    /// most-recently-created first; negative indices count from the end
    pub async fn list_links(&mut self, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let ids = self.repo.list(start, stop)?;
        if self.publish_reads {
            self.events.viewed_listing().await?;
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Action, PublishError};
    use crate::storage::StoreError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    /// Sink that records every event it is handed
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<(Action, Option<String>)>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn added(&mut self, link_id: &str) -> Result<(), PublishError> {
            self.events.push((Action::Added, Some(link_id.to_string())));
            Ok(())
        }

        async fn modified(
            &mut self,
            link_id: &str,
            _fields: &BTreeMap<String, String>,
        ) -> Result<(), PublishError> {
            self.events
                .push((Action::Modified, Some(link_id.to_string())));
            Ok(())
        }

        async fn deleted(&mut self, link_id: &str) -> Result<(), PublishError> {
            self.events
                .push((Action::Deleted, Some(link_id.to_string())));
            Ok(())
        }

        async fn viewed_link(&mut self, link_id: &str) -> Result<(), PublishError> {
            self.events
                .push((Action::ViewedLink, Some(link_id.to_string())));
            Ok(())
        }

        async fn viewed_field(&mut self, link_id: &str, field: &str) -> Result<(), PublishError> {
            self.events
                .push((Action::ViewedField, Some(format!("{link_id}:{field}"))));
            Ok(())
        }

        async fn viewed_exists(&mut self, link_id: &str, exists: bool) -> Result<(), PublishError> {
            self.events
                .push((Action::ViewedExists, Some(format!("{link_id}:{exists}"))));
            Ok(())
        }

        async fn viewed_listing(&mut self) -> Result<(), PublishError> {
            self.events.push((Action::ViewedListing, None));
            Ok(())
        }
    }

    fn test_store() -> LinkStore<RecordingSink> {
        LinkStore::with_parts(
            Repository::open_in_memory().unwrap(),
            RecordingSink::default(),
        )
    }

    fn sample(url: &str) -> NewLink {
        NewLink::new("Example", "A sample page", url, "u1")
    }

    fn actions(store: &LinkStore<RecordingSink>) -> Vec<Action> {
        store.events.events.iter().map(|(a, _)| *a).collect()
    }

    #[tokio::test]
    async fn test_add_then_get_returns_stored_fields() {
        let mut store = test_store();

        let id = store.add(sample("https://example.com")).await.unwrap();
        assert!(!id.is_empty());

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.link_id, id);
        assert_eq!(record.page_title, "Example");
        assert_eq!(record.url_address, "https://example.com");
        assert_eq!(actions(&store), vec![Action::Added, Action::ViewedLink]);
    }

    #[tokio::test]
    async fn test_add_assigns_unique_identifiers() {
        let mut store = test_store();
        let a = store.add(sample("https://a.example.com")).await.unwrap();
        let b = store.add(sample("https://b.example.com")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_add_duplicate_url_mutates_nothing_and_emits_nothing() {
        let mut store = test_store();
        store.add(sample("https://example.com")).await.unwrap();

        let err = store.add(sample("https://example.com")).await.unwrap_err();
        assert!(err.is_duplicate_url());

        assert_eq!(store.count_links().unwrap(), 1);
        assert_eq!(actions(&store), vec![Action::Added]);
    }

    #[tokio::test]
    async fn test_modify_merges_fields_and_emits() {
        let mut store = test_store();
        let id = store.add(sample("https://example.com")).await.unwrap();

        store
            .modify(
                &id,
                LinkPatch {
                    page_title: Some("New title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.page_title, "New title");
        assert_eq!(record.desc_text, "A sample page");
        assert!(actions(&store).contains(&Action::Modified));
    }

    #[tokio::test]
    async fn test_modify_url_to_taken_url_fails_without_mutation() {
        let mut store = test_store();
        let a = store.add(sample("https://a.example.com")).await.unwrap();
        store.add(sample("https://b.example.com")).await.unwrap();

        let err = store
            .modify(
                &a,
                LinkPatch {
                    url_address: Some("https://b.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_duplicate_url());

        let record = store.get(&a).await.unwrap().unwrap();
        assert_eq!(record.url_address, "https://a.example.com");
        assert!(!actions(&store).contains(&Action::Modified));
    }

    #[tokio::test]
    async fn test_modify_same_url_skips_swap() {
        let mut store = test_store();
        let id = store.add(sample("https://example.com")).await.unwrap();

        store
            .modify(
                &id,
                LinkPatch {
                    url_address: Some("https://example.com".to_string()),
                    page_title: Some("Still here".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.url_address, "https://example.com");
        assert_eq!(record.page_title, "Still here");
    }

    #[tokio::test]
    async fn test_modify_absent_link_is_noop() {
        let mut store = test_store();
        store
            .modify(
                "missing",
                LinkPatch {
                    page_title: Some("ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(actions(&store).is_empty());
    }

    #[tokio::test]
    async fn test_delete_frees_url_and_decrements_count() {
        let mut store = test_store();
        let id = store.add(sample("https://example.com")).await.unwrap();
        assert_eq!(store.count_links().unwrap(), 1);

        store.delete(&id).await.unwrap();

        assert!(!store.exists(&id).await.unwrap());
        assert_eq!(store.count_links().unwrap(), 0);
        assert!(actions(&store).contains(&Action::Deleted));

        // The URL is free for a new link
        store.add(sample("https://example.com")).await.unwrap();
        assert_eq!(store.count_links().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_absent_link_emits_nothing() {
        let mut store = test_store();
        store.delete("missing").await.unwrap();
        assert!(actions(&store).is_empty());
    }

    #[tokio::test]
    async fn test_read_telemetry_events() {
        let mut store = test_store();
        let id = store.add(sample("https://example.com")).await.unwrap();

        store.get(&id).await.unwrap();
        store.get_field(&id, fields::URL_ADDRESS).await.unwrap();
        store.exists(&id).await.unwrap();
        store.list_links(0, -1).await.unwrap();
        store.count_links().unwrap();

        assert_eq!(
            actions(&store),
            vec![
                Action::Added,
                Action::ViewedLink,
                Action::ViewedField,
                Action::ViewedExists,
                Action::ViewedListing,
            ]
        );
    }

    #[tokio::test]
    async fn test_read_telemetry_can_be_disabled() {
        let mut store = test_store().publish_reads(false);
        let id = store.add(sample("https://example.com")).await.unwrap();

        store.get(&id).await.unwrap();
        store.exists(&id).await.unwrap();
        store.list_links(0, -1).await.unwrap();

        assert_eq!(actions(&store), vec![Action::Added]);
    }

    #[tokio::test]
    async fn test_listing_is_reverse_insertion_order() {
        let mut store = test_store();
        let mut ids = Vec::new();
        for i in 0..4 {
            let link = sample(&format!("https://example.com/{i}"))
                .created_at(Utc.timestamp_opt(1_000 + i, 0).unwrap());
            ids.push(store.add(link).await.unwrap());
        }

        let listed = store.list_links(0, -1).await.unwrap();
        let expected: Vec<String> = ids.iter().rev().cloned().collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn test_get_field_absent_is_none_not_error() {
        let mut store = test_store();
        assert!(store
            .get_field("missing", fields::URL_ADDRESS)
            .await
            .unwrap()
            .is_none());
        let id = store.add(sample("https://example.com")).await.unwrap();
        assert!(store.get_field(&id, "bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let mut store = test_store();

        let id = store
            .add(NewLink::new("A", "B", "http://x", "u1"))
            .await
            .unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.url_address, "http://x");

        let err = store
            .add(NewLink::new("A2", "B2", "http://x", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUrl { .. }));

        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());

        store
            .add(NewLink::new("A3", "B3", "http://x", "u3"))
            .await
            .unwrap();
    }
}
