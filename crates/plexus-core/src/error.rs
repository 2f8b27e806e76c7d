//! Error types for plexus-core

use crate::event_bus::CallbackId;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// One or more synchronous subscribers failed during `publish`.
    ///
    /// Every subscriber in the delivery snapshot was still invoked.
    #[error("{} of {delivered} subscribers of '{topic}' failed", .failures.len())]
    SubscriberFailed {
        /// Topic that was published
        topic: String,
        /// Number of deliveries attempted
        delivered: usize,
        /// Individual failures, one per failing callback
        failures: Vec<SubscriberFailure>,
    },

    /// No tokio runtime is available to schedule work on
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// A single subscriber failure collected by a synchronous publish.
#[derive(Debug, Error)]
#[error("subscriber {callback} failed: {error:#}")]
pub struct SubscriberFailure {
    /// Identity of the failing callback
    pub callback: CallbackId,
    /// What the callback returned
    #[source]
    pub error: anyhow::Error,
}

impl Error {
    /// Failures collected by a synchronous publish, if this is one.
    #[must_use]
    pub fn subscriber_failures(&self) -> &[SubscriberFailure] {
        match self {
            Error::SubscriberFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}
