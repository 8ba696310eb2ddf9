//! Error types for the voxnav-browser crate.

use std::time::Duration;

use thiserror::Error;
use voxnav_commands::HostError;

/// Errors that can occur while driving a page over CDP.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to Chrome DevTools.
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// No debuggable page was found at a DevTools HTTP endpoint.
    #[error("no page target found at {url}")]
    NoPageTarget { url: String },

    /// The WebSocket connection is gone.
    #[error("CDP connection closed")]
    Disconnected,

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A CDP command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// Navigation failed.
    #[error("navigation failed: {reason}")]
    NavigationFailed { reason: String },

    /// JavaScript evaluation threw.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// Target discovery over HTTP failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BrowserError {
    pub(crate) fn protocol(detail: impl Into<String>) -> Self {
        BrowserError::Protocol {
            detail: detail.into(),
        }
    }
}

impl From<BrowserError> for HostError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Disconnected
            | BrowserError::ConnectionFailed { .. }
            | BrowserError::NoPageTarget { .. } => HostError::Unavailable(err.to_string()),
            other => HostError::Failed(other.to_string()),
        }
    }
}
