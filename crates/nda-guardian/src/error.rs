//! Error types for nda-guardian.
//!
//! This module defines all error types used throughout the crate, providing
//! enough context for logs and user-facing messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for nda-guardian operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the audit database.
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

    // === Document Errors ===
    /// The submitted document text was empty.
    #[error("Document text cannot be empty.")]
    EmptyDocument,

    /// A query arrived before any document was loaded.
    #[error("No document loaded. POST /api/load first.")]
    NoDocument,

    // === Model Errors ===
    /// The local function-calling model failed.
    #[error("local model error: {0}")]
    LocalModel(String),

    /// The cloud model failed or returned something unusable.
    #[error("cloud model error: {0}")]
    CloudModel(String),

    /// No cloud API key is configured.
    #[error("cloud API key is not configured")]
    CloudUnavailable,

    /// An HTTP request to a model endpoint failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read an input file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

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

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for nda-guardian operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new local model error.
    #[must_use]
    pub fn local_model(message: impl Into<String>) -> Self {
        Self::LocalModel(message.into())
    }

    /// Create a new cloud model error.
    #[must_use]
    pub fn cloud_model(message: impl Into<String>) -> Self {
        Self::CloudModel(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error was caused by the caller's input rather than by
    /// the service itself.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyDocument | Self::NoDocument)
    }

    /// Check if this error came from a model backend.
    #[must_use]
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::LocalModel(_) | Self::CloudModel(_) | Self::CloudUnavailable | Self::Http(_)
        )
    }
}
