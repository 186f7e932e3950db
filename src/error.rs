// src/error.rs

//! Unified error handling for the result fetcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for fetcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Preference pattern did not compile
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Candidate carries no page metadata; dropped without a failure record
    #[error("No metadata for candidate {0}")]
    MetadataMissing(String),

    /// Snippet could not be produced for a candidate
    #[error("Snippet fetch failed for {url_hash}: {reason}")]
    SnippetFetch { url_hash: String, reason: String },

    /// A worker hit an unexpected fault while processing a candidate
    #[error("Worker {worker} fault: {message}")]
    WorkerFault { worker: usize, message: String },
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a snippet fetch error for a url hash.
    pub fn snippet_fetch(url_hash: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::SnippetFetch {
            url_hash: url_hash.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a worker fault error.
    pub fn worker_fault(worker: usize, message: impl fmt::Display) -> Self {
        Self::WorkerFault {
            worker,
            message: message.to_string(),
        }
    }
}
