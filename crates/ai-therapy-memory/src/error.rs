//! Error types for memory operations and remote calls.

use std::path::PathBuf;

/// Errors returned by memory stores and the memory bank.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Writing or preparing the backing storage failed.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Remote dependency failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failures of calls against remote services (embedding and chat endpoints).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// A single attempt failed; the text is classified by the retry executor.
    #[error("{0}")]
    Request(String),
    /// The caller's usage allowance is depleted. Never retried.
    #[error("credits exhausted for {operation}: {message}")]
    QuotaExhausted { operation: String, message: String },
    /// The failure did not match any transient marker.
    #[error("{operation} failed: {message}")]
    NonRetryable { operation: String, message: String },
    /// Transient failures persisted past the retry budget.
    #[error("operation {operation} failed after {retries} retries: {message}")]
    RetriesExhausted {
        operation: String,
        retries: u32,
        message: String,
    },
}

impl RemoteError {
    /// Build a single-attempt failure from any displayable error.
    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }

    /// True when the failure is terminal quota/credit exhaustion.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    /// Keep the source chain in the text so transport failures stay classifiable.
    fn from(err: reqwest::Error) -> Self {
        let mut message = if err.is_timeout() {
            format!("timeout: {err}")
        } else if err.is_connect() {
            format!("connection error: {err}")
        } else {
            err.to_string()
        };
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Request(message)
    }
}
