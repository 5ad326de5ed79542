//! Error types for the telemetry client.

use thiserror::Error;

/// Errors that can occur when fetching telemetry.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    Parse(String),

    /// Connection to the telemetry source failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

impl ClientError {
    /// True for failures reaching the source, false for malformed payloads.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ClientError::Parse(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Parse(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}
