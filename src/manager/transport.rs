//! Transport trait for the two manager channels

use super::protocol::{JobReply, JobRequest};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors on the channels to the manager
#[derive(Debug, Error)]
pub enum TransportError {
    /// Endpoint unreachable or unresolvable at connect time
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the channel
    #[error("channel closed by manager")]
    Closed,

    /// I/O failure during a round trip or poll
    #[error("manager channel i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Reply was not valid JSON or lacked required fields
    #[error("malformed reply from manager: {message}")]
    MalformedReply { message: String },
}

impl TransportError {
    /// Create a connect error for an endpoint
    pub fn connect(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a malformed-reply error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReply {
            message: message.into(),
        }
    }
}

/// The two messaging channels the coordination engine drives: a strict
/// request/reply channel for job submission and a subscribe channel for
/// completion broadcasts.
///
/// `&mut self` on [`request`](Self::request) enforces the
/// one-outstanding-request-at-a-time discipline of the submission channel.
#[async_trait]
pub trait ManagerTransport: Send {
    /// Send one submission request and await exactly one reply
    async fn request(&mut self, request: &JobRequest) -> Result<JobReply, TransportError>;

    /// Register interest in broadcast messages with the given prefix.
    /// Subscriptions accumulate.
    fn subscribe(&mut self, topic: &str);

    /// Drop a previously registered subscription
    fn unsubscribe(&mut self, topic: &str);

    /// Read the subscribe channel for up to `timeout`, returning the first
    /// message matching a subscription, or `None` if nothing matched in time
    async fn poll_broadcast(&mut self, timeout: Duration)
    -> Result<Option<String>, TransportError>;

    /// Release both channels. Idempotent.
    fn close(&mut self);
}
