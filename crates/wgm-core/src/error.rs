//! Domain-specific errors for mirror operations

use std::path::PathBuf;
use thiserror::Error;
use wgm_schema::ManifestError;
use wgm_schema::types::PackageIdError;

/// Errors that abort an operation (or the current package within a batch).
///
/// Per-package conditions that merely skip work (missing package, no
/// eligible installer, failed transfer) are reported through
/// [`crate::download::Skip`] instead.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// A project file is missing; the project was never initialized.
    #[error("{file} not found in {path}. Run 'wgm init --path <path>' first.")]
    NotInitialized {
        /// Project directory.
        path: PathBuf,
        /// Missing file name.
        file: &'static str,
    },

    /// The manifest repository has not been checked out yet.
    #[error("Repository not found at {0}. Run 'wgm sync-repo' first.")]
    RepositoryMissing(PathBuf),

    /// Malformed package identifier.
    #[error(transparent)]
    PackageId(#[from] PackageIdError),

    /// Unreadable manifest file.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A project JSON file could not be parsed or written.
    #[error("Failed to parse {path}: {source}")]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A git invocation failed or git is not installed.
    #[error("git failed: {0}")]
    Git(String),

    /// Free-form error with a static context label.
    #[error("{context}: {message}")]
    Context {
        /// What was being done.
        context: &'static str,
        /// Error text.
        message: String,
    },
}

impl MirrorError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}

/// Result alias for mirror operations.
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
