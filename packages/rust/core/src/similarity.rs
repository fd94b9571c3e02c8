//! Pluggable pairwise similarity signals for the grouper.
//!
//! Each strategy scores a pair of documents in `[0.0, 1.0]`. The grouper
//! only sees the [`SimilarityStrategy`] trait, so strategies can be swapped
//! without touching clustering.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;

use corpusmerge_shared::{DocId, Document};

/// A similarity backend failed to score a pair.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct SimilarityError {
    pub reason: String,
}

impl SimilarityError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Scores how related two documents are.
pub trait SimilarityStrategy: Send + Sync {
    /// Short identifier recorded in logs and the corpus manifest.
    fn name(&self) -> &'static str;

    /// Similarity in `[0.0, 1.0]`; higher means more related.
    fn score(&self, a: &Document, b: &Document) -> Result<f64, SimilarityError>;
}

// ---------------------------------------------------------------------------
// Path prefix
// ---------------------------------------------------------------------------

/// Shared leading path segments over the longer path's segment count.
///
/// `guide/intro.md` and `guide/setup.md` share one of two segments (0.5);
/// top-level files share nothing and score 0.
#[derive(Debug, Clone)]
pub struct PathPrefixSimilarity {
    /// Pairs sharing fewer leading segments than this score 0.
    pub min_shared_segments: usize,
}

impl Default for PathPrefixSimilarity {
    fn default() -> Self {
        Self {
            min_shared_segments: 1,
        }
    }
}

impl SimilarityStrategy for PathPrefixSimilarity {
    fn name(&self) -> &'static str {
        "path-prefix"
    }

    fn score(&self, a: &Document, b: &Document) -> Result<f64, SimilarityError> {
        let sa = path_segments(&a.path);
        let sb = path_segments(&b.path);

        let longest = sa.len().max(sb.len());
        if longest == 0 {
            return Ok(0.0);
        }

        let shared = sa.iter().zip(&sb).take_while(|(x, y)| x == y).count();
        if shared < self.min_shared_segments.max(1) {
            return Ok(0.0);
        }

        Ok(shared as f64 / longest as f64)
    }
}

/// Split a path into segments, dropping the extension of the last one.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if let Some(last) = segments.last_mut() {
        let file_name: &str = *last;
        if let Some((stem, _ext)) = file_name.rsplit_once('.') {
            if !stem.is_empty() {
                *last = stem;
            }
        }
    }

    segments
}

// ---------------------------------------------------------------------------
// Heading overlap
// ---------------------------------------------------------------------------

/// Words too common in documentation headings to signal relatedness.
const STOP_WORDS: &[&str] = &[
    "and", "the", "for", "with", "your", "you", "how", "what", "from", "into", "using", "use",
    "about", "this", "that", "are", "can", "not", "all", "introduction", "overview",
];

/// Jaccard overlap of Markdown heading vocabulary.
///
/// Token sets are cached per document id for the lifetime of the strategy.
#[derive(Debug, Default)]
pub struct HeadingOverlapSimilarity {
    cache: Mutex<HashMap<DocId, Arc<HashSet<String>>>>,
}

impl HeadingOverlapSimilarity {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens_for(&self, doc: &Document) -> Arc<HashSet<String>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(tokens) = cache.get(&doc.id) {
                return Arc::clone(tokens);
            }
        }

        let tokens = Arc::new(heading_tokens(&doc.text));
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(doc.id, Arc::clone(&tokens));
        }
        tokens
    }
}

impl SimilarityStrategy for HeadingOverlapSimilarity {
    fn name(&self) -> &'static str {
        "heading-overlap"
    }

    fn score(&self, a: &Document, b: &Document) -> Result<f64, SimilarityError> {
        let ta = self.tokens_for(a);
        let tb = self.tokens_for(b);

        let union = ta.union(&tb).count();
        if union == 0 {
            return Ok(0.0);
        }
        let intersection = ta.intersection(&tb).count();
        Ok(intersection as f64 / union as f64)
    }
}

/// Collect normalized heading tokens from ATX headings outside code fences.
pub fn heading_tokens(markdown: &str) -> HashSet<String> {
    static H_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^ {0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("valid regex")
    });

    let mut tokens = HashSet::new();
    // Marker of the open fence; only the same marker closes it.
    let mut open_fence: Option<&str> = None;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let marker = ["```", "~~~"].into_iter().find(|m| trimmed.starts_with(*m));
        match (open_fence, marker) {
            (None, Some(m)) => {
                open_fence = Some(m);
                continue;
            }
            (Some(open), Some(m)) if open == m => {
                open_fence = None;
                continue;
            }
            (Some(_), _) => continue,
            (None, None) => {}
        }

        let Some(caps) = H_RE.captures(line) else {
            continue;
        };

        for word in caps[1].split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if word.chars().count() >= 3 && !STOP_WORDS.contains(&word.as_str()) {
                tokens.insert(word);
            }
        }
    }

    tokens
}

// ---------------------------------------------------------------------------
// Embedding cosine
// ---------------------------------------------------------------------------

/// Cosine similarity between precomputed document embeddings.
///
/// Negative cosine is clamped to 0. A document without a vector, or a pair
/// with mismatched dimensions, is a strategy failure.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSimilarity {
    vectors: HashMap<DocId, Vec<f32>>,
}

impl EmbeddingSimilarity {
    pub fn new(vectors: HashMap<DocId, Vec<f32>>) -> Self {
        Self { vectors }
    }

    /// Pair each document with the embedding at the same position.
    pub fn from_documents(documents: &[Document], embeddings: Vec<Vec<f32>>) -> Self {
        let vectors = documents.iter().map(|d| d.id).zip(embeddings).collect();
        Self { vectors }
    }

    fn vector(&self, doc: &Document) -> Result<&[f32], SimilarityError> {
        self.vectors
            .get(&doc.id)
            .map(Vec::as_slice)
            .ok_or_else(|| SimilarityError::new(format!("no embedding for {}", doc.path)))
    }
}

impl SimilarityStrategy for EmbeddingSimilarity {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn score(&self, a: &Document, b: &Document) -> Result<f64, SimilarityError> {
        let va = self.vector(a)?;
        let vb = self.vector(b)?;
        if va.len() != vb.len() {
            return Err(SimilarityError::new(format!(
                "embedding dimension mismatch: {} has {}, {} has {}",
                a.path,
                va.len(),
                b.path,
                vb.len()
            )));
        }
        Ok(cosine(va, vb).max(0.0))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).min(1.0)
}
