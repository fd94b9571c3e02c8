//! Error types for corpusmerge.
//!
//! Library crates use [`CorpusMergeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all corpusmerge operations.
#[derive(Debug, thiserror::Error)]
pub enum CorpusMergeError {
    /// The similarity backend failed; aborts the run unless configured to
    /// degrade to singleton clustering.
    #[error("clustering unavailable ({strategy}): {reason}")]
    ClusteringUnavailable { strategy: String, reason: String },

    /// No collision-free delimiter was found within the retry budget.
    #[error("delimiter collision: no safe delimiter after {attempts} attempts")]
    DelimiterCollision { attempts: u32 },

    /// A zero-length cluster reached the serializer.
    #[error("empty cluster #{cluster_index}: grouper produced a cluster with no documents")]
    EmptyCluster { cluster_index: usize },

    /// A multi-document unit does not contain its delimiter.
    #[error("delimiter {delimiter:?} not found in serialized text of {output_path}")]
    DelimiterNotFound {
        output_path: String,
        delimiter: String,
    },

    /// Splitting a unit did not reproduce its documents.
    #[error("round-trip mismatch for {output_path}: {details}")]
    RoundTripMismatch {
        output_path: String,
        details: String,
    },

    /// Embedding service error (HTTP, auth, or response parsing).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, malformed listing, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CorpusMergeError>;

impl CorpusMergeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a clustering failure for the named strategy.
    pub fn clustering(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClusteringUnavailable {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single cluster and the run may continue.
    pub fn is_per_cluster(&self) -> bool {
        matches!(self, Self::DelimiterCollision { .. })
    }
}
