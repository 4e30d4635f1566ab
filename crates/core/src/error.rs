//! Error types for Marginalia operations.
//!
//! This module defines the main error type [`MarginaliaError`], returned by
//! operations whose failure the caller has to handle (invalid configuration,
//! malformed metadata descriptors, unreadable input), and [`FailureReason`],
//! which records why a single metadata lookup degraded to its placeholder.
//!
//! Metadata failures are contained: they are stored on the cache entry and
//! logged, never returned as an `Err`.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::{MarginaliaError, Result};
//!
//! fn words_per_minute(value: u32) -> Result<u32> {
//!     if value == 0 {
//!         return Err(MarginaliaError::ConfigError("words_per_minute must be positive".into()));
//!     }
//!     Ok(value)
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Main error type for augmentation operations.
#[derive(Error, Debug)]
pub enum MarginaliaError {
    /// HTTP request errors from reqwest.
    ///
    /// Only produced when fetching an input page; metadata lookups record
    /// a [`FailureReason`] instead.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing errors, including invalid CSS selectors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// A metadata target element carries malformed data attributes.
    ///
    /// `index` is the position of the element among all metadata targets
    /// in document order.
    #[error("Invalid metadata target #{index}: {reason}")]
    InvalidTarget { index: usize, reason: String },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File read/write errors.
    #[error("Failed to write to file: {0}")]
    WriteError(#[from] std::io::Error),

    /// Configuration errors.
    ///
    /// Returned when a configuration file cannot be parsed or a value is
    /// out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Report serialization errors.
    #[error("Failed to serialize report: {0}")]
    SerializeError(#[from] serde_json::Error),
}

impl From<toml::de::Error> for MarginaliaError {
    fn from(err: toml::de::Error) -> Self {
        MarginaliaError::ConfigError(err.to_string())
    }
}

/// Result type alias for MarginaliaError.
pub type Result<T> = std::result::Result<T, MarginaliaError>;

/// Why a metadata lookup failed.
///
/// Every variant degrades the affected targets to the configured
/// placeholder. `RateLimited` is kept distinct so it can be logged
/// separately from ordinary network failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Transport-level failure (DNS, connection reset, TLS).
    Network { message: String },
    /// The API refused the request because the rate limit is exhausted.
    RateLimited { reset: Option<u64> },
    /// The response did not contain the expected field.
    MalformedResponse { field: String },
    /// The request exceeded the configured timeout.
    Timeout,
    /// Any other non-success HTTP status.
    Http { status: u16 },
}

impl FailureReason {
    /// True for failures caused by the API's rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FailureReason::RateLimited { .. })
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network { message } => write!(f, "network failure: {}", message),
            FailureReason::RateLimited { reset: Some(reset) } => write!(f, "rate limited until {}", reset),
            FailureReason::RateLimited { reset: None } => write!(f, "rate limited"),
            FailureReason::MalformedResponse { field } => write!(f, "response is missing field `{}`", field),
            FailureReason::Timeout => write!(f, "request timed out"),
            FailureReason::Http { status } => write!(f, "unexpected HTTP status {}", status),
        }
    }
}
