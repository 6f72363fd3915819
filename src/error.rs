//! Error taxonomy for a polling run.
//!
//! Only [`ConfigError`] is fatal. Every other error is recovered inside the
//! region (or item) that produced it:
//!
//! | Error | Recovery |
//! |-------|----------|
//! | [`ScanError`] | treated as "no candidates", region ends |
//! | [`FetchError`] | item skipped, not marked seen |
//! | [`ClassificationError`] | degraded analysis is substituted |
//! | [`DeliveryError`] | item not marked seen, retried next run |
//! | [`WatermarkError`] | region skipped on load, logged on record |

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Missing or invalid startup configuration. Aborts the process before any scan.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load {what} from {path}: {reason}")]
    Load {
        what: &'static str,
        path: String,
        reason: String,
    },
}

/// The region listing could not be fetched or parsed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("network error: {0}")]
    Network(String),

    #[error("listing returned HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Network(err.to_string())
    }
}

/// The full article body could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("article returned HTTP {0}")]
    Status(u16),

    #[error("article page had no readable text")]
    Empty,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// The LLM call failed or answered with something that is not an analysis.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM reply is not a valid analysis: {0}")]
    Malformed(String),
}

/// The notification endpoint did not accept the message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("webhook rejected message (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Network(err.to_string())
    }
}

/// Watermark state could not be read or durably written.
#[derive(Debug, Error)]
#[error("watermark I/O on {path}: {source}")]
pub struct WatermarkError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WatermarkError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
