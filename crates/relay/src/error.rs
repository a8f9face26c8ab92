//! Error types at the collaborator seams
//!
//! The sync engine matches on these to decide between waiting, skipping,
//! and aborting a cycle. Everything else travels as `anyhow::Error`.

use std::path::PathBuf;
use std::time::Duration;

use crate::models::PostId;

/// Failure reported by a feed source
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The feed API asked us to back off
    #[error("rate limited by the feed API")]
    RateLimited { retry_after: Option<Duration> },

    /// The requested post no longer exists
    #[error("post {0} not found")]
    NotFound(PostId),

    /// The post exists but cannot be read (withheld, protected author)
    #[error("post {id} unavailable: {reason}")]
    Unavailable { id: PostId, reason: String },

    /// Any other request or decoding failure
    #[error("feed request failed: {0:#}")]
    Transient(anyhow::Error),
}

impl FeedError {
    /// The post can never be fetched, so retrying it is pointless
    pub fn unreachable_post(&self) -> Option<PostId> {
        match self {
            FeedError::NotFound(id) | FeedError::Unavailable { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }
}

/// Failure reported by a delivery channel
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The messaging API asked us to wait before sending again
    #[error("rate limited by the messaging API, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The message was refused and must not be retried
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Transport or decoding failure
    #[error("delivery failed: {0:#}")]
    Transient(anyhow::Error),
}

impl DeliveryError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }
}

/// Invalid or missing configuration; fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source:#}", path.display())]
    Load {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("'{0}' not present in config")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
