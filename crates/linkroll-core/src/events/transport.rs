//! Broker transport abstraction
//!
//! The publisher's state machine is written against these traits so tests
//! can drive it with a scripted double. `AmqpTransport` is the production
//! implementation: one AMQP connection carrying a channel for the durable
//! job queue and a channel for the fanout log exchange.

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use thiserror::Error;
use tracing::debug;

/// Durable queue for job messages
pub const JOB_QUEUE: &str = "link_jobs";
/// Fanout exchange for log messages
pub const LOG_EXCHANGE: &str = "link_logs";

/// Errors reported by a broker transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is closed or unreachable; reconnecting may help
    #[error("broker connection closed: {0}")]
    Closed(String),

    /// Anything else the broker refused
    #[error("broker error: {0}")]
    Broker(String),
}

impl TransportError {
    /// Whether this failure calls for a reconnect
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed(_))
    }
}

/// An established logical connection, ready to publish on both channels
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Publish to the durable job queue with the persistence flag set
    async fn publish_job(&self, body: &[u8]) -> Result<(), TransportError>;

    /// Publish to the fanout log exchange, fire-and-forget
    async fn publish_log(&self, body: &[u8]) -> Result<(), TransportError>;

    /// Close the underlying connection
    async fn close(&self) -> Result<(), TransportError>;
}

/// Factory for broker connections; one handshake attempt per call
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn connect(&mut self, url: &str) -> Result<Box<dyn BrokerChannel>, TransportError>;
}

/// Production transport over AMQP (RabbitMQ)
pub struct AmqpTransport;

#[async_trait]
impl BrokerTransport for AmqpTransport {
    async fn connect(&mut self, url: &str) -> Result<Box<dyn BrokerChannel>, TransportError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(classify)?;

        let jobs = connection.create_channel().await.map_err(classify)?;
        jobs.queue_declare(
            JOB_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(classify)?;

        let logs = connection.create_channel().await.map_err(classify)?;
        logs.exchange_declare(
            LOG_EXCHANGE,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(classify)?;

        debug!(url, queue = JOB_QUEUE, exchange = LOG_EXCHANGE, "broker handshake complete");
        Ok(Box::new(AmqpChannel {
            connection,
            jobs,
            logs,
        }))
    }
}

struct AmqpChannel {
    connection: Connection,
    jobs: Channel,
    logs: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn publish_job(&self, body: &[u8]) -> Result<(), TransportError> {
        let confirm = self
            .jobs
            .basic_publish(
                "",
                JOB_QUEUE,
                BasicPublishOptions::default(),
                body,
                // delivery mode 2: the broker persists until acknowledged
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(classify)?;
        confirm.await.map_err(classify)?;
        Ok(())
    }

    async fn publish_log(&self, body: &[u8]) -> Result<(), TransportError> {
        let confirm = self
            .logs
            .basic_publish(
                LOG_EXCHANGE,
                "",
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await
            .map_err(classify)?;
        confirm.await.map_err(classify)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(classify)
    }
}

fn classify(err: lapin::Error) -> TransportError {
    match err {
        lapin::Error::InvalidConnectionState(_)
        | lapin::Error::InvalidChannelState(_)
        | lapin::Error::IOError(_) => TransportError::Closed(err.to_string()),
        other => TransportError::Broker(other.to_string()),
    }
}
