//! Custom error types for xv.
//!
//! Provides structured error handling with detailed context for better
//! diagnostics and operator experience.

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::{CodecError, MergeConflict};
use crate::decode::DecodeError;

/// Primary error type for xv operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum XvError {
    // =========================================================================
    // Archive Errors
    // =========================================================================
    /// Archive file not found at the specified path.
    #[error("Archive not found at '{path}'")]
    ArchiveNotFound { path: PathBuf },

    /// Archive exists but its extension is not a supported container format.
    #[error("Unsupported archive format for '{path}' (expected .zip or .tar)")]
    UnsupportedArchive { path: PathBuf },

    /// Archive container could not be opened or read.
    #[error("Invalid archive structure: {reason}")]
    InvalidArchive { reason: String },

    /// Named entry missing from the container.
    #[error("Entry '{entry}' not found in archive")]
    EntryNotFound { entry: String },

    /// Zip container error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // =========================================================================
    // Decode and Codec Errors
    // =========================================================================
    /// A JSON line could not be decoded into an item.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A stored binary value failed to parse.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Two status facts for the same status disagree on immutable fields.
    #[error("Merge conflict for status {status_id} ({archive}, {entry}): {source}")]
    StatusMerge {
        archive: String,
        entry: String,
        status_id: u64,
        #[source]
        source: MergeConflict,
    },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] rocksdb::Error),

    /// Optimistic transaction failed to commit because of a detected conflict.
    /// Entries are imported by a single writer, so this signals a logic defect
    /// rather than contention.
    #[error("Transaction conflict importing '{entry}' from '{archive}'")]
    TransactionConflict { archive: String, entry: String },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// The run-wide pipeline deadline elapsed before all entries drained.
    #[error("Import deadline of {hours}h exceeded with {outstanding} entries outstanding")]
    DeadlineExceeded { hours: u64, outstanding: usize },

    /// Worker pool failure outside any single entry.
    #[error("Pipeline error: {reason}")]
    Pipeline { reason: String },

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    Path {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// Environment variable error.
    #[error("Invalid environment variable {var}: {reason}")]
    EnvVar { var: String, reason: String },

    // =========================================================================
    // CLI Errors
    // =========================================================================
    /// Invalid command-line argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error for the binary's top level.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for xv operations.
pub type Result<T> = std::result::Result<T, XvError>;

impl XvError {
    /// Create an archive not found error.
    pub fn archive_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ArchiveNotFound { path: path.into() }
    }

    /// Create an unsupported archive error.
    pub fn unsupported_archive(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedArchive { path: path.into() }
    }

    /// Create an invalid archive error.
    pub fn invalid_archive(reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            reason: reason.into(),
        }
    }

    /// Create a pipeline error.
    pub fn pipeline(reason: impl Into<String>) -> Self {
        Self::Pipeline {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Path {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error aborts only the entry being imported rather than
    /// the whole run. Merge conflicts and transaction conflicts leave the
    /// entry unmarked so a later run retries exactly the failed entries.
    #[must_use]
    pub const fn is_entry_scoped(&self) -> bool {
        matches!(
            self,
            Self::StatusMerge { .. } | Self::TransactionConflict { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ArchiveNotFound { .. } => {
                Some("Verify the archive path; directories are expanded to their .zip/.tar files.")
            }
            Self::UnsupportedArchive { .. } => {
                Some("Only .zip and .tar stream-archive containers are supported.")
            }
            Self::StatusMerge { .. } => Some(
                "The entry was left unmarked; investigate the conflicting status and re-run the import.",
            ),
            Self::TransactionConflict { .. } => {
                Some("Ensure no other xv process is writing to the same store.")
            }
            Self::DeadlineExceeded { .. } => {
                Some("Re-run the import; completed entries are skipped automatically.")
            }
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| XvError::with_context(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| XvError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Import failed")
/// * `explanation` - What went wrong and why
/// * `suggestions` - List of actionable suggestions
///
/// # Returns
/// A formatted error string ready for display.
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}
