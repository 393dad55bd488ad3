//! Error types for Memento Mirror.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted re-invocation
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::remote::TransportError;
use crate::sync::SyncError;

/// Result type alias for Memento Mirror operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    CollectionNotFound,
    LibraryNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidTableName,

    // Remote (exit 5)
    RemoteError,
    RemoteUnavailable,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CollectionNotFound => "COLLECTION_NOT_FOUND",
            Self::LibraryNotFound => "LIBRARY_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidTableName => "INVALID_TABLE_NAME",
            Self::RemoteError => "REMOTE_ERROR",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (2-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::CollectionNotFound | Self::LibraryNotFound => 3,
            Self::InvalidArgument | Self::InvalidTableName => 4,
            Self::RemoteError | Self::RemoteUnavailable => 5,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-invoking the same command may succeed.
    ///
    /// True for transient remote failures and failed syncs (the watermark
    /// is never advanced on failure, so a re-run is always safe).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable | Self::SyncError | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Memento Mirror operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `mm init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Collection not configured: {id}")]
    CollectionNotFound {
        id: String,
        /// Identifiers of the configured collections, for hint display.
        configured: Vec<String>,
    },

    #[error("Library not found on remote: {id}")]
    LibraryNotFound { id: String },

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] TransportError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{failed} of {total} collections failed to sync")]
    SyncFailed { failed: usize, total: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            Self::LibraryNotFound { .. } => ErrorCode::LibraryNotFound,
            Self::InvalidTableName(_) => ErrorCode::InvalidTableName,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Remote(e) => {
                if e.is_retryable() {
                    ErrorCode::RemoteUnavailable
                } else {
                    ErrorCode::RemoteError
                }
            }
            Self::Fetch(_) => ErrorCode::RemoteUnavailable,
            Self::Sync(_) | Self::SyncFailed { .. } => ErrorCode::SyncError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `mm init` to create the database and config".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Already initialized at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::CollectionNotFound { id, configured } => {
                if configured.is_empty() {
                    Some(format!(
                        "No collections are configured. Add {{\"id\": \"{id}\"}} to the \
                         \"collections\" list in config.json."
                    ))
                } else {
                    Some(format!("Configured collections: {}", configured.join(", ")))
                }
            }

            Self::LibraryNotFound { .. } => {
                Some("Use `mm libraries` to list the libraries your token can see.".to_string())
            }

            Self::InvalidTableName(_) => Some(
                "Table names may contain ASCII letters, digits and underscores, and must not start with a digit"
                    .to_string(),
            ),

            Self::Remote(e) if matches!(e.status_code(), Some(401 | 403)) => Some(
                "Check the API token (MEMENTO_TOKEN or remote.token in config.json)".to_string(),
            ),

            Self::Fetch(_) => Some(
                "The watermark was not advanced; re-running the sync is safe.".to_string(),
            ),

            Self::SyncFailed { .. } | Self::Sync(_) => Some(
                "Failed collections keep their previous watermark; re-run `mm sync` to retry them."
                    .to_string(),
            ),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Remote(_)
            | Self::InvalidArgument(_)
            | Self::Config(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
