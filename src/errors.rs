//! Error types for schemaguard library operations.
//!
//! Library code returns [`GuardResult`]; the command layer wraps these in
//! `anyhow` with context. The taxonomy follows how failures are handled:
//!
//! - Missing environment (absent directories, tables) is *not* an error. It
//!   is logged as a warning and the component returns an empty result.
//! - Malformed input is converted into issues/findings by the caller.
//! - Integrity violations ([`GuardError::IntegrityMismatch`],
//!   [`GuardError::MissingManifest`]) abort a multi-step workflow.
//! - [`GuardError::Refused`] is raised when a guarded operation is attempted
//!   without its precondition (e.g. an EXTREME-risk mapping without a
//!   validated backup).

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// File system I/O failure with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed or holds invalid values.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Database access failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization of manifests, schema files or job files failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backup directory exists but holds no manifest.
    #[error("backup manifest missing at {0}")]
    MissingManifest(PathBuf),

    /// No backup directory exists for the identifier.
    #[error("backup {0} not found")]
    BackupNotFound(String),

    /// A data file no longer matches the hash recorded at backup time.
    #[error("integrity mismatch for table {table}: expected {expected}, found {actual}")]
    IntegrityMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    /// The configured database driver has no executing implementation.
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),

    /// A data statement could not be understood.
    #[error("malformed statement: {0}")]
    MalformedStatement(String),

    /// A guarded operation was attempted without its precondition.
    #[error("operation refused: {0}")]
    Refused(String),
}

impl GuardError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// True for failures that mean a backup can no longer be trusted.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::IntegrityMismatch { .. } | Self::MissingManifest(_) | Self::BackupNotFound(_)
        )
    }
}

/// Extension for attaching a path to `std::io::Result`.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> GuardResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> GuardResult<T> {
        self.map_err(|source| GuardError::io(path, source))
    }
}
