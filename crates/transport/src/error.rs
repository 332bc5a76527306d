use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {kind} link profile: {source}")]
    InvalidProfile {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("a transport needs a non-empty connection ID")]
    EmptyConnectionId,

    #[error("transport for link {link_id} is closed")]
    Closed { link_id: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("inbound package exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed on {address}: {source}")]
    Accept {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn closed(link_id: impl Into<String>) -> Self {
        Self::Closed {
            link_id: link_id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
