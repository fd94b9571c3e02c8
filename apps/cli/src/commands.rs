//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use corpusmerge_core::listing::{build_manifest, parse_listing, render_listing, sha256_hex};
use corpusmerge_core::splitter::split_expecting;
use corpusmerge_core::{
    EmbeddingSimilarity, HeadingOverlapSimilarity, MergeReport, PathPrefixSimilarity,
    ProgressReporter, SimilarityStrategy, run_pipeline,
};
use corpusmerge_embeddings::EmbeddingClient;
use corpusmerge_shared::{
    AppConfig, CorpusMergeError, Delimiter, Document, SimilarityFailurePolicy, StrategyKind,
    init_config, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::{source, writer};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// corpusmerge: merge related documents into collision-safe units.
#[derive(Parser)]
#[command(
    name = "corpusmerge",
    version,
    about = "Cluster related documents and merge each cluster into one unit with a collision-free delimiter.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Group a directory of documents and write the merged listing.
    Merge {
        /// Directory to read documents from.
        input: PathBuf,

        /// Listing file to write (the manifest goes to <OUT>.manifest.json).
        #[arg(short, long)]
        out: PathBuf,

        /// Similarity strategy: path-prefix, heading-overlap, or embedding.
        #[arg(short, long)]
        strategy: Option<String>,

        /// Similarity threshold in [0, 1].
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Split clusters larger than this into chunks.
        #[arg(long)]
        max_cluster_size: Option<usize>,

        /// What to do when the strategy fails: abort or singleton.
        #[arg(long)]
        on_similarity_failure: Option<String>,
    },

    /// Check that every unit in a listing splits back into its documents.
    Verify {
        /// Listing file written by `merge`.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Flag values that override the loaded config for one `merge` run.
#[derive(Debug, Default)]
pub(crate) struct MergeOverrides {
    pub strategy: Option<String>,
    pub threshold: Option<f64>,
    pub max_cluster_size: Option<usize>,
    pub on_similarity_failure: Option<String>,
}

impl MergeOverrides {
    fn apply(self, config: &mut AppConfig) -> Result<()> {
        if let Some(strategy) = self.strategy {
            config.grouping.strategy = strategy.parse::<StrategyKind>()?;
        }
        if let Some(threshold) = self.threshold {
            config.grouping.threshold = threshold;
        }
        if let Some(max) = self.max_cluster_size {
            config.grouping.max_cluster_size = Some(max);
        }
        if let Some(policy) = self.on_similarity_failure {
            config.grouping.on_similarity_failure = policy.parse::<SimilarityFailurePolicy>()?;
        }
        config.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "corpusmerge=info",
        1 => "corpusmerge=debug",
        _ => "corpusmerge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Merge {
            input,
            out,
            strategy,
            threshold,
            max_cluster_size,
            on_similarity_failure,
        } => {
            let overrides = MergeOverrides {
                strategy,
                threshold,
                max_cluster_size,
                on_similarity_failure,
            };
            cmd_merge(&input, &out, overrides).await
        }
        Command::Verify { file } => cmd_verify(&file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

async fn cmd_merge(input: &Path, out: &Path, overrides: MergeOverrides) -> Result<()> {
    let mut config = load_config()?;
    overrides.apply(&mut config)?;

    info!(
        input = %input.display(),
        out = %out.display(),
        strategy = config.grouping.strategy.as_str(),
        threshold = config.grouping.threshold,
        "merging documents"
    );

    let reporter = CliProgress::new();
    let report = merge_directory(input, out, &config, &reporter).await?;

    println!();
    println!("  Documents: {}", report.document_count);
    println!("  Clusters:  {}", report.cluster_count);
    println!("  Merged:    {}", report.units.len());
    println!("  Failed:    {}", report.failures.len());
    println!("  Strategy:  {}", report.strategy);
    if report.degraded {
        println!("  Note:      similarity failed, every document kept as its own unit");
    }
    println!("  Listing:   {}", out.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    for failure in &report.failures {
        println!(
            "  ! cluster #{} ({}): {}",
            failure.cluster_index,
            failure.documents.join(", "),
            failure.error
        );
    }
    println!();

    if !report.is_complete() {
        return Err(eyre!(
            "{} of {} clusters could not be merged",
            report.failures.len(),
            report.cluster_count
        ));
    }
    Ok(())
}

/// Load, group, merge, and write one directory. Failed clusters are
/// recorded in the manifest; the listing holds every successful unit.
pub(crate) async fn merge_directory(
    input: &Path,
    out: &Path,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<MergeReport> {
    progress.phase("Reading documents");
    let documents = source::load_documents(input, &config.source.extensions)?;
    info!(count = documents.len(), "documents loaded");

    let strategy = build_strategy(config, &documents).await?;
    let report = run_pipeline(documents, strategy.as_ref(), config, progress).await?;

    progress.phase("Writing listing");
    let listing = render_listing(&report.units);
    let manifest = build_manifest(&report, config.grouping.threshold, env!("CARGO_PKG_VERSION"));
    writer::write_corpus(out, &listing, &manifest)?;

    Ok(report)
}

/// Instantiate the configured similarity strategy.
///
/// The embedding strategy fetches vectors up front. A fetch failure is a
/// clustering failure: it aborts, or under the singleton policy yields a
/// strategy with no vectors so grouping degrades to singletons.
async fn build_strategy(
    config: &AppConfig,
    documents: &[Document],
) -> Result<Box<dyn SimilarityStrategy>> {
    let grouping = &config.grouping;
    let strategy: Box<dyn SimilarityStrategy> = match grouping.strategy {
        StrategyKind::PathPrefix => Box::new(PathPrefixSimilarity {
            min_shared_segments: grouping.min_shared_segments,
        }),
        StrategyKind::HeadingOverlap => Box::new(HeadingOverlapSimilarity::new()),
        StrategyKind::Embedding => match fetch_embeddings(config, documents).await {
            Ok(vectors) => Box::new(EmbeddingSimilarity::from_documents(documents, vectors)),
            Err(e) => {
                let err = CorpusMergeError::clustering("embedding", e.to_string());
                if grouping.on_similarity_failure == SimilarityFailurePolicy::Abort {
                    return Err(err.into());
                }
                warn!(error = %err, "embeddings unavailable, degrading to singletons");
                Box::new(EmbeddingSimilarity::new(HashMap::new()))
            }
        },
    };
    Ok(strategy)
}

async fn fetch_embeddings(
    config: &AppConfig,
    documents: &[Document],
) -> corpusmerge_shared::Result<Vec<Vec<f32>>> {
    // One document never needs a comparison
    if documents.len() < 2 {
        return Ok(vec![Vec::new(); documents.len()]);
    }
    let api_key = config.embedding.api_key()?;
    let client = EmbeddingClient::new(&api_key, &config.embedding)?;
    client.embed_documents(documents).await
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

/// Outcome of verifying one listing.
#[derive(Debug, Default)]
pub(crate) struct VerifySummary {
    pub units_checked: usize,
    pub documents_checked: usize,
    /// Clusters the merge run itself could not produce.
    pub unmerged_clusters: usize,
    pub problems: Vec<String>,
}

impl VerifySummary {
    pub(crate) fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

async fn cmd_verify(file: &Path) -> Result<()> {
    info!(file = %file.display(), "verifying listing");
    let summary = verify_listing(file)?;

    println!();
    println!("  Units:     {}", summary.units_checked);
    println!("  Documents: {}", summary.documents_checked);
    if summary.unmerged_clusters > 0 {
        println!("  Unmerged:  {} (recorded in manifest)", summary.unmerged_clusters);
    }
    for problem in &summary.problems {
        println!("  ! {problem}");
    }
    println!();

    if !summary.is_ok() {
        return Err(eyre!("{} unit(s) failed verification", summary.problems.len()));
    }
    println!("  All units round-trip cleanly.");
    Ok(())
}

/// Re-split every unit in a listing against its manifest entry.
pub(crate) fn verify_listing(file: &Path) -> Result<VerifySummary> {
    let (listing, manifest) = writer::read_corpus(file)?;
    let bodies = parse_listing(&listing, &manifest.units)?;

    let mut summary = VerifySummary {
        unmerged_clusters: manifest.failures.len(),
        ..VerifySummary::default()
    };

    for (unit, body) in manifest.units.iter().zip(bodies) {
        summary.units_checked += 1;

        let hash = sha256_hex(body);
        if hash != unit.sha256 {
            summary.problems.push(format!(
                "{}: content hash mismatch (expected {}, found {hash})",
                unit.output_path, unit.sha256
            ));
            continue;
        }

        let delimiter = Delimiter::literal(unit.delimiter.clone());
        match split_expecting(body, &delimiter, unit.documents.len(), &unit.output_path) {
            Ok(pieces) => summary.documents_checked += pieces.len(),
            Err(e) => summary.problems.push(e.to_string()),
        }
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn cluster_merged(&self, output_path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Merging [{current}/{total}] {output_path}"));
    }

    fn cluster_failed(&self, cluster_index: usize, error: &CorpusMergeError) {
        self.spinner
            .println(format!("  cluster #{cluster_index} failed: {error}"));
    }

    fn done(&self, _report: &MergeReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use corpusmerge_core::SilentProgress;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cm-cli-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn sample_docs(root: &Path) {
        write(root, "guide/routing/guards.md", "# Guards\nProtect routes.");
        write(root, "guide/routing/lazy.md", "# Lazy loading\nSplit bundles.");
        write(root, "reference/api.md", "# API\n<|RELATED_DOC_SEP-magic-|> literal");
    }

    #[test]
    fn cli_parses_merge_flags() {
        let cli = Cli::try_parse_from([
            "corpusmerge",
            "-vv",
            "--log-format",
            "json",
            "merge",
            "docs",
            "--out",
            "corpus.txt",
            "--strategy",
            "heading-overlap",
            "--threshold",
            "0.3",
            "--max-cluster-size",
            "5",
            "--on-similarity-failure",
            "singleton",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Command::Merge {
                input,
                out,
                strategy,
                threshold,
                max_cluster_size,
                on_similarity_failure,
            } => {
                assert_eq!(input, PathBuf::from("docs"));
                assert_eq!(out, PathBuf::from("corpus.txt"));
                assert_eq!(strategy.as_deref(), Some("heading-overlap"));
                assert_eq!(threshold, Some(0.3));
                assert_eq!(max_cluster_size, Some(5));
                assert_eq!(on_similarity_failure.as_deref(), Some("singleton"));
            }
            _ => panic!("expected merge command"),
        }
    }

    #[test]
    fn merge_requires_out() {
        assert!(Cli::try_parse_from(["corpusmerge", "merge", "docs"]).is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        MergeOverrides {
            strategy: Some("embedding".into()),
            threshold: Some(0.8),
            max_cluster_size: Some(3),
            on_similarity_failure: Some("singleton".into()),
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.grouping.strategy, StrategyKind::Embedding);
        assert_eq!(config.grouping.threshold, 0.8);
        assert_eq!(config.grouping.max_cluster_size, Some(3));
        assert_eq!(
            config.grouping.on_similarity_failure,
            SimilarityFailurePolicy::Singleton
        );
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let mut config = AppConfig::default();
        let bad_threshold = MergeOverrides {
            threshold: Some(1.5),
            ..MergeOverrides::default()
        };
        assert!(bad_threshold.apply(&mut config).is_err());

        let bad_strategy = MergeOverrides {
            strategy: Some("telepathy".into()),
            ..MergeOverrides::default()
        };
        assert!(bad_strategy.apply(&mut config).is_err());
    }

    #[tokio::test]
    async fn merge_then_verify() {
        let tmp = temp_dir();
        let input = tmp.join("docs");
        sample_docs(&input);
        let out = tmp.join("out/corpus.txt");

        let report = merge_directory(&input, &out, &AppConfig::default(), &SilentProgress)
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.document_count, 3);
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.units[0].output_path, "guide/routing/guards.md");

        let listing = std::fs::read_to_string(&out).unwrap();
        assert!(listing.starts_with("=== guide/routing/guards.md ===\n# Guards"));
        assert!(out.with_file_name("corpus.txt.manifest.json").exists());

        let summary = verify_listing(&out).unwrap();
        assert!(summary.is_ok(), "{:?}", summary.problems);
        assert_eq!(summary.units_checked, 2);
        assert_eq!(summary.documents_checked, 3);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn verify_reports_tampered_units() {
        let tmp = temp_dir();
        let input = tmp.join("docs");
        sample_docs(&input);
        let out = tmp.join("corpus.txt");

        merge_directory(&input, &out, &AppConfig::default(), &SilentProgress)
            .await
            .unwrap();

        // Same length, different bytes: parsing succeeds, the hash check fails
        let listing = std::fs::read_to_string(&out).unwrap();
        std::fs::write(&out, listing.replacen("Protect", "Detect!", 1)).unwrap();

        let summary = verify_listing(&out).unwrap();
        assert!(!summary.is_ok());
        assert_eq!(summary.problems.len(), 1);
        assert!(summary.problems[0].contains("guide/routing/guards.md"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn embedding_failure_degrades_under_singleton_policy() {
        let tmp = temp_dir();
        let input = tmp.join("docs");
        sample_docs(&input);
        let out = tmp.join("corpus.txt");

        let mut config = AppConfig::default();
        config.grouping.strategy = StrategyKind::Embedding;
        config.grouping.on_similarity_failure = SimilarityFailurePolicy::Singleton;
        config.embedding.api_key_env = "CORPUSMERGE_TEST_KEY_THAT_IS_NEVER_SET".into();

        let report = merge_directory(&input, &out, &config, &SilentProgress)
            .await
            .unwrap();
        assert!(report.degraded);
        assert_eq!(report.units.len(), 3);

        config.grouping.on_similarity_failure = SimilarityFailurePolicy::Abort;
        let err = merge_directory(&input, &out, &config, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("clustering unavailable"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
