//! Core error types for studyflow-core.
//!
//! This module defines a comprehensive error hierarchy using thiserror
//! for better error handling and reporting across the library.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing entity errors
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// Authorization errors (sync disabled, credential failures)
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Upstream service errors (AI model, calendar API)
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Divergent state awaiting user resolution
    #[error("Sync conflict: {0}")]
    Conflict(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid date string
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Invalid HH:MM time string
    #[error("Invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    /// End does not come after start
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange { start: String, end: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Missing entity errors.
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("Task {0} not found")]
    Task(String),

    #[error("No study plan for {user_id} on {date}")]
    Plan { user_id: String, date: String },

    #[error("Study block {0} not found")]
    Block(String),

    #[error("Event mapping {0} not found")]
    Mapping(String),
}

/// Authorization errors. These require user action (enabling sync or
/// re-running the OAuth flow) rather than a retry.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    /// Calendar sync is disabled or was never enabled
    #[error("Calendar sync is not enabled")]
    SyncDisabled,

    /// No calendar connection exists for the user
    #[error("No calendar connection for user {0}")]
    NotConnected(String),

    /// Authorization code exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed; re-authorization required
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Stored credentials could not be decrypted
    #[error("Credential failure: {0}")]
    CredentialFailure(String),
}

/// Upstream service errors.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// AI model returned an error or unusable output
    #[error("Model error: {0}")]
    Model(String),

    /// Calendar API rejected the request
    #[error("Calendar API error (status {status}): {message}")]
    Calendar { status: u16, message: String },

    /// Network-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request exceeded its deadline
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Upstream(UpstreamError::Network(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
