//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//!
//! Three kinds of failure can end a reconciliation cycle early:
//! - [`Error::Resolution`]: no discovery endpoint produced a valid address
//! - [`Error::Api`]: the provider call failed or answered `success: false`
//! - [`Error::Verification`]: a write reported success but the content read
//!   back differs from what was requested
//!
//! An inconclusive confirmation is not an error; see
//! [`CycleOutcome::Unconfirmed`](crate::engine::CycleOutcome::Unconfirmed).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// One entry of a provider's `errors` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Provider error code
    pub code: i64,
    /// Provider error message, verbatim
    pub message: String,
}

impl ApiErrorDetail {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Failure of a single provider API call
///
/// `status` is `None` when the request never produced an HTTP response
/// (connect error, timeout) or the body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub details: Vec<ApiErrorDetail>,
    /// Free-form context when the provider gave no structured errors
    pub context: Option<String>,
}

impl ApiError {
    /// Check whether any detail carries the given provider code
    pub fn has_code(&self, code: i64) -> bool {
        self.details.iter().any(|d| d.code == code)
    }

    /// Rate limiting and provider-side failures
    pub fn is_transient(&self) -> bool {
        matches!(self.status, None | Some(429) | Some(500..=599))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}", status)?,
            None => write!(f, "no response")?,
        }

        if !self.details.is_empty() {
            let joined = self
                .details
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            write!(f, ": {}", joined)?;
        }

        if let Some(ref context) = self.context {
            write!(f, " ({})", context)?;
        }

        Ok(())
    }
}

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// No discovery endpoint returned a valid address
    #[error("address resolution failed: {last_error}")]
    Resolution {
        /// The last underlying failure, from the last endpoint tried
        last_error: String,
    },

    /// Provider call failed at transport level or returned `success: false`
    #[error("provider API error ({provider}): {source}")]
    Api {
        provider: String,
        #[source]
        source: ApiError,
    },

    /// A mutation succeeded at transport level but the read-back did not match
    #[error("verification failed: expected content {expected}, provider returned {actual}")]
    Verification { expected: String, actual: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl std::error::Error for ApiError {}

impl Error {
    /// Create a resolution error
    pub fn resolution(last_error: impl Into<String>) -> Self {
        Self::Resolution {
            last_error: last_error.into(),
        }
    }

    /// Create an API error from a provider response
    pub fn api(
        provider: impl Into<String>,
        status: Option<u16>,
        details: Vec<ApiErrorDetail>,
    ) -> Self {
        Self::Api {
            provider: provider.into(),
            source: ApiError {
                status,
                details,
                context: None,
            },
        }
    }

    /// Create an API error for a call that produced no usable response
    pub fn transport(provider: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            source: ApiError {
                status: None,
                details: Vec::new(),
                context: Some(context.into()),
            },
        }
    }

    /// Create a verification error
    pub fn verification(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Verification {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Borrow the API error, if this is one
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
