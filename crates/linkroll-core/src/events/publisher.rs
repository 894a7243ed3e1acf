//! Resilient broker producer
//!
//! One publisher owns one logical broker connection and an explicit
//! connection state. Reconnects run as a bounded loop with a quadratic
//! backoff schedule; when the retry budget is spent the publisher fails
//! permanently and must be rebuilt.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::message::{JobMessage, LogMessage};
use super::transport::{AmqpTransport, BrokerChannel, BrokerTransport, TransportError};
use crate::models::format_timestamp;

/// Errors surfaced by the publisher
#[derive(Debug, Error)]
pub enum PublishError {
    /// The reconnect budget is spent; the publisher is unusable until
    /// externally reconstructed
    #[error("too many broker reconnect attempts ({retries})")]
    TooManyRetries { retries: u32 },

    /// A transport failure that one reconnect-and-resubmit cycle could
    /// not recover
    #[error("broker transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Message could not be encoded
    #[error("failed to encode message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherStatus {
    /// Not connected
    Disconnected,
    /// Handshake in progress (possibly backing off between attempts)
    Connecting,
    /// Connected, queue and exchange declared
    Connected,
    /// Terminal: retry budget spent
    Failed,
}

/// Backoff schedule for reconnect attempts
///
/// `wait(n) = base_delay * n²` where `n` is the current retry count, so
/// delays grow strictly between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn wait(&self, retries: u32) -> Duration {
        self.base_delay * retries.saturating_mul(retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_retries: 10,
        }
    }
}

enum Category {
    Job,
    Log,
}

/// Producer client for the durable job queue and the fanout log exchange
pub struct EventPublisher<T: BrokerTransport> {
    transport: T,
    url: String,
    policy: RetryPolicy,
    retries: u32,
    status: PublisherStatus,
    channel: Option<Box<dyn BrokerChannel>>,
}

impl EventPublisher<AmqpTransport> {
    /// Publisher over AMQP; call `connect` before publishing
    pub fn amqp(url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::new(AmqpTransport, url, policy)
    }
}

impl<T: BrokerTransport> EventPublisher<T> {
    pub fn new(transport: T, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            policy,
            // Matches the quadratic schedule: the first failed handshake
            // waits base_delay * 1.
            retries: 1,
            status: PublisherStatus::Disconnected,
            channel: None,
        }
    }

    pub fn status(&self) -> PublisherStatus {
        self.status
    }

    /// Establish the broker connection, retrying with backoff
    ///
    /// Each attempt performs the transport handshake and declares the job
    /// queue and log exchange. The retry counter carries across calls and
    /// resets only on success; reaching `max_retries` is terminal.
    pub async fn connect(&mut self) -> Result<(), PublishError> {
        if self.status == PublisherStatus::Failed {
            return Err(PublishError::TooManyRetries {
                retries: self.retries,
            });
        }

        self.status = PublisherStatus::Connecting;
        loop {
            if self.retries >= self.policy.max_retries {
                self.status = PublisherStatus::Failed;
                self.channel = None;
                error!(retries = self.retries, "giving up on broker connection");
                return Err(PublishError::TooManyRetries {
                    retries: self.retries,
                });
            }

            match self.transport.connect(&self.url).await {
                Ok(channel) => {
                    self.channel = Some(channel);
                    self.status = PublisherStatus::Connected;
                    self.retries = 0;
                    info!(url = %self.url, "connected to broker");
                    return Ok(());
                }
                Err(err) => {
                    let delay = self.policy.wait(self.retries);
                    warn!(
                        error = %err,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        "broker handshake failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    self.retries += 1;
                }
            }
        }
    }

    /// Close the connection; the publisher can reconnect afterwards unless
    /// it has already failed
    pub async fn close(&mut self) -> Result<(), PublishError> {
        if let Some(channel) = self.channel.take() {
            channel.close().await?;
        }
        if self.status != PublisherStatus::Failed {
            self.status = PublisherStatus::Disconnected;
        }
        Ok(())
    }

    /// Send on the channel for the category; on a closed connection,
    /// reconnect once and resubmit the same message exactly once more
    async fn publish(&mut self, category: Category, body: &[u8]) -> Result<(), PublishError> {
        let mut resubmitted = false;
        loop {
            if self.status != PublisherStatus::Connected || self.channel.is_none() {
                self.connect().await?;
            }
            let Some(channel) = self.channel.as_deref() else {
                continue;
            };

            let result = match category {
                Category::Job => channel.publish_job(body).await,
                Category::Log => channel.publish_log(body).await,
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if err.is_closed() && !resubmitted => {
                    warn!(error = %err, "broker connection lost, reconnecting");
                    resubmitted = true;
                    self.status = PublisherStatus::Disconnected;
                    self.channel = None;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Publish a durable job message
    pub async fn job(&mut self, message: &JobMessage) -> Result<(), PublishError> {
        let body = serde_json::to_vec(message)?;
        self.publish(Category::Job, &body).await
    }

    /// Stamp and publish an ephemeral log message
    pub async fn log(&mut self, mut message: LogMessage) -> Result<(), PublishError> {
        message.time = Some(format_timestamp(&Utc::now()));
        let body = serde_json::to_vec(&message)?;
        self.publish(Category::Log, &body).await
    }
}
