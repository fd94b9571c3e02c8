//! Application configuration for corpusmerge.
//!
//! User config lives at `~/.corpusmerge/corpusmerge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusMergeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "corpusmerge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".corpusmerge";

/// Longest hex digest a SHA-256 can supply.
pub const MAX_DIGEST_HEX_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Config structs (matching corpusmerge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub delimiter: DelimiterConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.grouping.validate()?;
        self.delimiter.validate()?;
        self.merge.validate()?;
        self.embedding.validate()
    }
}

/// Which similarity signal the grouper uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    PathPrefix,
    HeadingOverlap,
    Embedding,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathPrefix => "path-prefix",
            Self::HeadingOverlap => "heading-overlap",
            Self::Embedding => "embedding",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = CorpusMergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "path-prefix" => Ok(Self::PathPrefix),
            "heading-overlap" => Ok(Self::HeadingOverlap),
            "embedding" => Ok(Self::Embedding),
            other => Err(CorpusMergeError::config(format!(
                "unknown strategy '{other}': expected path-prefix, heading-overlap, or embedding"
            ))),
        }
    }
}

/// What the grouper does when the similarity strategy fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityFailurePolicy {
    /// Fail the run with `ClusteringUnavailable`.
    #[default]
    Abort,
    /// Degrade to one singleton cluster per document.
    Singleton,
}

impl FromStr for SimilarityFailurePolicy {
    type Err = CorpusMergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "abort" => Ok(Self::Abort),
            "singleton" => Ok(Self::Singleton),
            other => Err(CorpusMergeError::config(format!(
                "unknown similarity failure policy '{other}': expected abort or singleton"
            ))),
        }
    }
}

/// `[grouping]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    /// Minimum pairwise score for two documents to be related.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Split larger clusters into ingestion-ordered chunks of this size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cluster_size: Option<usize>,

    #[serde(default)]
    pub on_similarity_failure: SimilarityFailurePolicy,

    /// Path-prefix strategy: pairs sharing fewer leading segments score 0.
    #[serde(default = "default_min_shared_segments")]
    pub min_shared_segments: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            threshold: default_threshold(),
            max_cluster_size: None,
            on_similarity_failure: SimilarityFailurePolicy::default(),
            min_shared_segments: default_min_shared_segments(),
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CorpusMergeError::config(format!(
                "grouping.threshold must be within [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        if self.max_cluster_size == Some(0) {
            return Err(CorpusMergeError::config(
                "grouping.max_cluster_size must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_strategy() -> StrategyKind {
    StrategyKind::PathPrefix
}
fn default_threshold() -> f64 {
    0.5
}
fn default_min_shared_segments() -> usize {
    1
}

/// `[delimiter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelimiterConfig {
    /// Human-readable marker placed before the digest.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Opening guard.
    #[serde(default = "default_open")]
    pub open: String,

    /// Closing guard.
    #[serde(default = "default_close")]
    pub close: String,

    /// Hex characters of the digest used by the first candidate.
    #[serde(default = "default_digest_hex_len")]
    pub digest_hex_len: usize,

    /// Candidates tried before giving up with `DelimiterCollision`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for DelimiterConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            open: default_open(),
            close: default_close(),
            digest_hex_len: default_digest_hex_len(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl DelimiterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.open.is_empty() || self.close.is_empty() {
            return Err(CorpusMergeError::config(
                "delimiter.prefix, delimiter.open and delimiter.close must be non-empty",
            ));
        }
        if !(1..=MAX_DIGEST_HEX_LEN).contains(&self.digest_hex_len) {
            return Err(CorpusMergeError::config(format!(
                "delimiter.digest_hex_len must be within 1..={MAX_DIGEST_HEX_LEN}, got {}",
                self.digest_hex_len
            )));
        }
        if self.max_attempts == 0 {
            return Err(CorpusMergeError::config(
                "delimiter.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_prefix() -> String {
    "RELATED_DOC_SEP-magic-".into()
}
fn default_open() -> String {
    "<|".into()
}
fn default_close() -> String {
    "|>".into()
}
fn default_digest_hex_len() -> usize {
    16
}
fn default_max_attempts() -> u32 {
    8
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Clusters merged concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(CorpusMergeError::config("merge.concurrency must be at least 1"));
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    4
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File extensions (without the dot) picked up by the directory source.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "mdx".into(), "txt".into()]
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API (the client appends `/embeddings`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CorpusMergeError::config("embedding.batch_size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(CorpusMergeError::config("embedding.max_retries must be at least 1"));
        }
        Ok(())
    }

    /// Read the API key from the configured env var.
    pub fn api_key(&self) -> Result<String> {
        let var_name = &self.api_key_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(CorpusMergeError::config(format!(
                "embedding API key not found. Set the {var_name} environment variable."
            ))),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> usize {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.corpusmerge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CorpusMergeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.corpusmerge/corpusmerge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CorpusMergeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CorpusMergeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CorpusMergeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CorpusMergeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CorpusMergeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
