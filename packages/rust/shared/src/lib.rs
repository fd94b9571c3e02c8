//! Shared types, error model, and configuration for corpusmerge.
//!
//! This crate is the foundation depended on by all other corpusmerge crates.
//! It provides:
//! - [`CorpusMergeError`] as the unified error type
//! - Domain types ([`Document`], [`Cluster`], [`Delimiter`], [`MergedUnit`])
//! - The corpus manifest written next to each listing ([`CorpusManifest`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DelimiterConfig, EmbeddingConfig, GroupingConfig, MAX_DIGEST_HEX_LEN,
    MergeConfig, SimilarityFailurePolicy, SourceConfig, StrategyKind, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CorpusMergeError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, Cluster, CorpusManifest, Delimiter, DocId, Document,
    ManifestFailure, ManifestUnit, MergedUnit, RunId,
};
