//! Core clustering and merge logic for corpusmerge.
//!
//! This crate groups related documents, synthesizes collision-free
//! delimiters, serializes each group into a merged unit, and splits merged
//! units back apart for verification. It performs no I/O of its own.

pub mod delimiter;
pub mod disjoint_set;
pub mod grouper;
pub mod listing;
pub mod pipeline;
pub mod serializer;
pub mod similarity;
pub mod splitter;

pub use delimiter::DelimiterSynthesizer;
pub use disjoint_set::DisjointSet;
pub use grouper::{Grouper, GroupingOutcome};
pub use pipeline::{ClusterFailure, MergeReport, ProgressReporter, SilentProgress, run_pipeline};
pub use serializer::serialize_cluster;
pub use similarity::{
    EmbeddingSimilarity, HeadingOverlapSimilarity, PathPrefixSimilarity, SimilarityError,
    SimilarityStrategy,
};
pub use splitter::{split, verify_unit};
