//! Core domain types for the merge pipeline and its corpus manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the corpus manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque document identifier (UUID v7, time-sortable).
///
/// Identity is scoped to a single run; ordering never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub Uuid);

impl DocId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Document / Cluster
// ---------------------------------------------------------------------------

/// A single source document. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    /// Source-relative path (e.g. `laravel/eloquent-relationships.md`).
    pub path: String,
    /// Raw document text.
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: DocId::new(),
            path: path.into(),
            text: text.into(),
        }
    }
}

/// An ordered group of related documents.
///
/// `indices[i]` is the ingestion index of `documents[i]`; both are kept in
/// ascending ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cluster {
    pub indices: Vec<usize>,
    pub documents: Vec<Document>,
}

impl Cluster {
    /// Build a cluster from `(ingestion_index, document)` pairs in any order.
    pub fn from_members(mut members: Vec<(usize, Document)>) -> Self {
        members.sort_by_key(|(index, _)| *index);
        let (indices, documents) = members.into_iter().unzip();
        Self { indices, documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document texts in merge order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.text.as_str())
    }

    /// Document paths in merge order.
    pub fn paths(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.path.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Delimiter / MergedUnit
// ---------------------------------------------------------------------------

/// A separator token that does not occur in any text of its cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiter {
    /// The full token, e.g. `<|RELATED_DOC_SEP-magic-3f2a9c0d11e4b7a8|>`.
    pub value: String,
    /// Hex digest embedded in the token.
    pub digest: String,
    /// Synthesis attempts used (1 = first candidate was safe).
    pub attempts: u32,
}

impl Delimiter {
    /// Wrap a literal token, e.g. one read back from a manifest.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            digest: String::new(),
            attempts: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// One cluster serialized and ready for the writer.
#[derive(Debug, Clone)]
pub struct MergedUnit {
    /// Path used in the `=== <path> ===` listing header.
    pub output_path: String,
    /// Position of the source cluster in grouping order.
    pub cluster_index: usize,
    pub documents: Cluster,
    pub delimiter: Delimiter,
    pub serialized_text: String,
}

// ---------------------------------------------------------------------------
// CorpusManifest
// ---------------------------------------------------------------------------

/// The `<listing>.manifest.json` sidecar written next to a corpus listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that wrote the listing.
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    /// Similarity strategy name used for grouping.
    pub strategy: String,
    pub threshold: f64,
    pub document_count: usize,
    pub units: Vec<ManifestUnit>,
    /// Clusters that could not be merged safely.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ManifestFailure>,
}

/// Manifest record for one written unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestUnit {
    pub output_path: String,
    pub delimiter: String,
    /// Member document paths in merge order.
    pub documents: Vec<String>,
    /// SHA-256 of the serialized text.
    pub sha256: String,
    pub size_bytes: usize,
}

/// Manifest record for a cluster that failed to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFailure {
    pub cluster_index: usize,
    pub documents: Vec<String>,
    pub error: String,
}
