//! Error types for numerolog.
//!
//! This module defines all error types used throughout the numerolog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for numerolog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored item could not be decoded.
    #[error("corrupt item {pk}/{sk}: {message}")]
    CorruptItem {
        /// Partition key of the item.
        pk: String,
        /// Sort key of the item.
        sk: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Language Model Errors ===
    /// The language model API rejected the request.
    #[error("language model API error: {0}")]
    LlmApi(String),

    /// The language model API rate-limited the request.
    #[error("language model rate limit exceeded")]
    LlmRateLimited,

    /// The language model returned no usable text.
    #[error("invalid language model response: {0}")]
    LlmResponse(String),

    /// The language model API could not be reached or timed out.
    #[error("language model unreachable: {0}")]
    LlmUnavailable(String),

    // === Chat Platform Errors ===
    /// A Telegram Bot API call failed.
    #[error("telegram {method} failed: {description}")]
    Telegram {
        /// Bot API method name.
        method: &'static str,
        /// Description returned by the API.
        description: String,
    },

    // === Network Errors ===
    /// An HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Input Errors ===
    /// User-supplied input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for numerolog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a Telegram error for the given Bot API method.
    #[must_use]
    pub fn telegram(method: &'static str, description: impl Into<String>) -> Self {
        Self::Telegram {
            method,
            description: description.into(),
        }
    }

    /// Create a corrupt item error.
    #[must_use]
    pub fn corrupt_item(
        pk: impl Into<String>,
        sk: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CorruptItem {
            pk: pk.into(),
            sk: sk.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from the language model.
    #[must_use]
    pub fn is_llm_error(&self) -> bool {
        matches!(
            self,
            Self::LlmApi(_)
                | Self::LlmRateLimited
                | Self::LlmResponse(_)
                | Self::LlmUnavailable(_)
        )
    }

    /// Check if retrying the call that produced this error may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LlmRateLimited
                | Self::Http(_)
                | Self::LlmApi(_)
                | Self::LlmResponse(_)
                | Self::LlmUnavailable(_)
        )
    }
}
