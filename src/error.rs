//! Error handling for the oscillation monitor
//!
//! This module defines the crate-wide error type and a Result alias.
//! Numerical failures inside the modal estimator use their own
//! [`EstimationError`](crate::analysis::EstimationError) type and are
//! collapsed by the caller instead of propagating through here.

use thiserror::Error;

/// Main error type for oscimon operations
#[derive(Error, Debug)]
pub enum OscimonError {
    /// Errors related to a phasor source connection
    #[error("Source error: {0}")]
    Source(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Errors returned by the time-series store boundary
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP transport errors from the store client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<OscimonError>,
    },
}

impl OscimonError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        OscimonError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for oscimon operations
pub type Result<T> = std::result::Result<T, OscimonError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
