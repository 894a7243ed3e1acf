//! Domain event publishing
//!
//! The store talks to an `EventSink`; the production sink is
//! `EventPublisher` over AMQP, and `NoopSink` serves broker-less
//! deployments. Mutations produce a durable job message plus a broadcast
//! log message; reads produce log messages only.

pub mod message;
pub mod publisher;
pub mod transport;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use message::{Action, JobMessage, LogMessage};
pub use publisher::{EventPublisher, PublishError, PublisherStatus, RetryPolicy};
pub use transport::{
    AmqpTransport, BrokerChannel, BrokerTransport, TransportError, JOB_QUEUE, LOG_EXCHANGE,
};

/// Where the store reports domain events
#[async_trait]
pub trait EventSink: Send {
    /// A link was created: job + log
    async fn added(&mut self, link_id: &str) -> Result<(), PublishError>;

    /// A link was changed: job + log, both naming the changed fields on
    /// the job side
    async fn modified(
        &mut self,
        link_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), PublishError>;

    /// A link was removed: job + log
    async fn deleted(&mut self, link_id: &str) -> Result<(), PublishError>;

    /// A full record was read: log only
    async fn viewed_link(&mut self, link_id: &str) -> Result<(), PublishError>;

    /// A single field was read: log only
    async fn viewed_field(&mut self, link_id: &str, field: &str) -> Result<(), PublishError>;

    /// An existence check ran: log only
    async fn viewed_exists(&mut self, link_id: &str, exists: bool) -> Result<(), PublishError>;

    /// The listing was read: log only
    async fn viewed_listing(&mut self) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: BrokerTransport> EventSink for EventPublisher<T> {
    async fn added(&mut self, link_id: &str) -> Result<(), PublishError> {
        self.job(&JobMessage::added(link_id)).await?;
        self.log(LogMessage::added(link_id)).await
    }

    async fn modified(
        &mut self,
        link_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), PublishError> {
        self.job(&JobMessage::modified(link_id, fields)).await?;
        self.log(LogMessage::modified(link_id)).await
    }

    async fn deleted(&mut self, link_id: &str) -> Result<(), PublishError> {
        self.job(&JobMessage::deleted(link_id)).await?;
        self.log(LogMessage::deleted(link_id)).await
    }

    async fn viewed_link(&mut self, link_id: &str) -> Result<(), PublishError> {
        self.log(LogMessage::viewed_link(link_id)).await
    }

    async fn viewed_field(&mut self, link_id: &str, field: &str) -> Result<(), PublishError> {
        self.log(LogMessage::viewed_field(link_id, field)).await
    }

    async fn viewed_exists(&mut self, link_id: &str, exists: bool) -> Result<(), PublishError> {
        self.log(LogMessage::viewed_exists(link_id, exists)).await
    }

    async fn viewed_listing(&mut self) -> Result<(), PublishError> {
        self.log(LogMessage::viewed_listing()).await
    }
}

/// Sink that drops every event, for deployments without a broker
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn added(&mut self, _link_id: &str) -> Result<(), PublishError> {
        Ok(())
    }

    async fn modified(
        &mut self,
        _link_id: &str,
        _fields: &BTreeMap<String, String>,
    ) -> Result<(), PublishError> {
        Ok(())
    }

    async fn deleted(&mut self, _link_id: &str) -> Result<(), PublishError> {
        Ok(())
    }

    async fn viewed_link(&mut self, _link_id: &str) -> Result<(), PublishError> {
        Ok(())
    }

    async fn viewed_field(&mut self, _link_id: &str, _field: &str) -> Result<(), PublishError> {
        Ok(())
    }

    async fn viewed_exists(&mut self, _link_id: &str, _exists: bool) -> Result<(), PublishError> {
        Ok(())
    }

    async fn viewed_listing(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}
