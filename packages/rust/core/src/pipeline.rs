//! End-to-end merge pipeline: documents → group → delimiter → serialize.
//!
//! Grouping runs on the caller's task. Delimiter synthesis and serialization
//! for distinct clusters share no state and run on blocking worker tasks,
//! bounded by `merge.concurrency`. Results are collected by cluster index, so
//! output order never depends on scheduling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use corpusmerge_shared::{AppConfig, Cluster, CorpusMergeError, Document, MergedUnit, Result};

use crate::delimiter::DelimiterSynthesizer;
use crate::grouper::Grouper;
use crate::serializer::serialize_cluster;
use crate::similarity::SimilarityStrategy;

/// A cluster that could not be merged safely.
#[derive(Debug, Clone)]
pub struct ClusterFailure {
    pub cluster_index: usize,
    /// Member document paths in merge order.
    pub documents: Vec<String>,
    pub error: String,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct MergeReport {
    /// Merged units in cluster order.
    pub units: Vec<MergedUnit>,
    /// Clusters that failed; never silently dropped.
    pub failures: Vec<ClusterFailure>,
    /// Name of the similarity strategy used.
    pub strategy: String,
    pub cluster_count: usize,
    pub document_count: usize,
    /// Grouping fell back to singleton clusters after a strategy failure.
    pub degraded: bool,
    pub elapsed: Duration,
}

impl MergeReport {
    /// Whether every cluster was merged.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each cluster's merge result is collected.
    fn cluster_merged(&self, output_path: &str, current: usize, total: usize);
    /// Called when a cluster fails with a per-cluster error.
    fn cluster_failed(&self, cluster_index: usize, error: &CorpusMergeError);
    /// Called when the pipeline completes.
    fn done(&self, report: &MergeReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn cluster_merged(&self, _output_path: &str, _current: usize, _total: usize) {}
    fn cluster_failed(&self, _cluster_index: usize, _error: &CorpusMergeError) {}
    fn done(&self, _report: &MergeReport) {}
}

/// Run the full merge pipeline.
///
/// 1. Group documents (a strategy failure halts the run unless configured
///    to degrade to singletons)
/// 2. Synthesize a delimiter per cluster
/// 3. Serialize each cluster into a merged unit
///
/// `DelimiterCollision` is reported per cluster and the run continues;
/// any other error aborts.
#[instrument(skip_all, fields(documents = documents.len(), strategy = strategy.name()))]
pub async fn run_pipeline(
    documents: Vec<Document>,
    strategy: &dyn SimilarityStrategy,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<MergeReport> {
    let start = Instant::now();
    config.merge.validate()?;
    let synthesizer = Arc::new(DelimiterSynthesizer::new(config.delimiter.clone())?);
    let document_count = documents.len();

    info!(document_count, "starting merge pipeline");

    // --- Phase 1: Grouping ---
    progress.phase("Grouping related documents");
    let grouping = Grouper::new(strategy, &config.grouping).group(&documents)?;
    drop(documents);

    let cluster_count = grouping.clusters.len();
    if grouping.degraded {
        warn!(cluster_count, "grouping degraded to singleton clusters");
    }

    // --- Phase 2: Delimiter synthesis + serialization ---
    progress.phase("Merging clusters");
    let semaphore = Arc::new(Semaphore::new(config.merge.concurrency));
    let mut handles = Vec::with_capacity(cluster_count);

    for (cluster_index, cluster) in grouping.clusters.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| CorpusMergeError::validation(format!("merge worker pool closed: {e}")))?;
        let synthesizer = Arc::clone(&synthesizer);
        let paths = cluster.paths();

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            merge_cluster(cluster_index, cluster, &synthesizer)
        });
        handles.push((cluster_index, paths, handle));
    }

    // --- Phase 3: Collect in cluster order ---
    let mut units = Vec::with_capacity(cluster_count);
    let mut failures = Vec::new();

    for (cluster_index, paths, handle) in handles {
        let outcome = handle.await.map_err(|e| {
            CorpusMergeError::validation(format!("merge worker for cluster #{cluster_index} failed: {e}"))
        })?;

        match outcome {
            Ok(unit) => {
                progress.cluster_merged(&unit.output_path, cluster_index + 1, cluster_count);
                units.push(unit);
            }
            Err(e) if e.is_per_cluster() => {
                warn!(
                    cluster_index,
                    documents = ?paths,
                    error = %e,
                    "cluster could not be merged"
                );
                progress.cluster_failed(cluster_index, &e);
                failures.push(ClusterFailure {
                    cluster_index,
                    documents: paths,
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let report = MergeReport {
        units,
        failures,
        strategy: strategy.name().to_string(),
        cluster_count,
        document_count,
        degraded: grouping.degraded,
        elapsed: start.elapsed(),
    };

    progress.done(&report);

    info!(
        clusters = report.cluster_count,
        merged = report.units.len(),
        failed = report.failures.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "merge pipeline complete"
    );

    Ok(report)
}

/// Synthesize a delimiter for one cluster and serialize it.
fn merge_cluster(
    cluster_index: usize,
    cluster: Cluster,
    synthesizer: &DelimiterSynthesizer,
) -> Result<MergedUnit> {
    let delimiter = synthesizer.synthesize(&cluster)?;
    debug!(
        cluster_index,
        documents = cluster.len(),
        attempts = delimiter.attempts,
        "delimiter synthesized"
    );
    serialize_cluster(cluster_index, cluster, delimiter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::similarity::{PathPrefixSimilarity, SimilarityError};
    use crate::splitter::verify_unit;
    use corpusmerge_shared::SimilarityFailurePolicy;

    struct Unavailable;

    impl SimilarityStrategy for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }
        fn score(&self, _a: &Document, _b: &Document) -> std::result::Result<f64, SimilarityError> {
            Err(SimilarityError::new("embedding service unavailable"))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        merged: Mutex<Vec<String>>,
        failed: Mutex<Vec<usize>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn cluster_merged(&self, output_path: &str, _current: usize, _total: usize) {
            self.merged.lock().unwrap().push(output_path.to_string());
        }
        fn cluster_failed(&self, cluster_index: usize, _error: &CorpusMergeError) {
            self.failed.lock().unwrap().push(cluster_index);
        }
        fn done(&self, _report: &MergeReport) {}
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("angular/routing/guards.md", "# Guards\nProtect routes."),
            Document::new("index.md", "# Home"),
            Document::new("angular/routing/lazy.md", "# Lazy loading"),
            Document::new("laravel/queues.md", "# Queues"),
            Document::new("angular/forms.md", "# Forms"),
        ]
    }

    #[tokio::test]
    async fn merges_related_documents() {
        let config = AppConfig::default();
        let strategy = PathPrefixSimilarity::default();
        let report = run_pipeline(corpus(), &strategy, &config, &SilentProgress)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.document_count, 5);
        let paths: Vec<Vec<String>> = report.units.iter().map(|u| u.documents.paths()).collect();
        assert_eq!(
            paths,
            vec![
                vec!["angular/routing/guards.md", "angular/routing/lazy.md"],
                vec!["index.md"],
                vec!["laravel/queues.md"],
                // one shared segment out of three is below the 0.5 threshold
                vec!["angular/forms.md"],
            ]
        );
        assert_eq!(
            report.units[0].serialized_text,
            format!(
                "# Guards\nProtect routes.{}# Lazy loading",
                report.units[0].delimiter
            )
        );
        assert_eq!(report.units[1].serialized_text, "# Home");
        for unit in &report.units {
            verify_unit(unit).unwrap();
        }
    }

    #[tokio::test]
    async fn reruns_are_byte_identical() {
        let docs = corpus();
        let strategy = PathPrefixSimilarity::default();

        let serial = AppConfig {
            merge: corpusmerge_shared::MergeConfig { concurrency: 1 },
            ..AppConfig::default()
        };
        let parallel = AppConfig {
            merge: corpusmerge_shared::MergeConfig { concurrency: 8 },
            ..AppConfig::default()
        };

        let a = run_pipeline(docs.clone(), &strategy, &serial, &SilentProgress)
            .await
            .unwrap();
        let b = run_pipeline(docs, &strategy, &parallel, &SilentProgress)
            .await
            .unwrap();

        let texts_a: Vec<&str> = a.units.iter().map(|u| u.serialized_text.as_str()).collect();
        let texts_b: Vec<&str> = b.units.iter().map(|u| u.serialized_text.as_str()).collect();
        assert_eq!(texts_a, texts_b);
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_report() {
        let config = AppConfig::default();
        let strategy = PathPrefixSimilarity::default();
        let report = run_pipeline(vec![], &strategy, &config, &SilentProgress)
            .await
            .unwrap();
        assert!(report.units.is_empty());
        assert_eq!(report.cluster_count, 0);
    }

    #[tokio::test]
    async fn delimiter_collision_fails_only_its_cluster() {
        let mut config = AppConfig::default();
        config.delimiter.digest_hex_len = 1;
        config.delimiter.max_attempts = 1;

        let poisoned: String = "0123456789abcdef"
            .chars()
            .map(|c| format!("<|RELATED_DOC_SEP-magic-{c}|>"))
            .collect();
        let docs = vec![
            Document::new("a.md", "fine"),
            Document::new("poisoned.md", poisoned),
            Document::new("z.md", "also fine"),
        ];

        let progress = RecordingProgress::default();
        let strategy = PathPrefixSimilarity::default();
        let report = run_pipeline(docs, &strategy, &config, &progress)
            .await
            .unwrap();

        assert_eq!(report.units.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cluster_index, 1);
        assert_eq!(report.failures[0].documents, vec!["poisoned.md"]);
        assert!(report.failures[0].error.contains("delimiter collision"));
        assert_eq!(*progress.merged.lock().unwrap(), vec!["a.md", "z.md"]);
        assert_eq!(*progress.failed.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn clustering_failure_halts_the_run() {
        let config = AppConfig::default();
        let err = run_pipeline(corpus(), &Unavailable, &config, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, CorpusMergeError::ClusteringUnavailable { .. }));
    }

    #[tokio::test]
    async fn clustering_failure_can_degrade() {
        let mut config = AppConfig::default();
        config.grouping.on_similarity_failure = SimilarityFailurePolicy::Singleton;
        let report = run_pipeline(corpus(), &Unavailable, &config, &SilentProgress)
            .await
            .unwrap();
        assert!(report.degraded);
        assert_eq!(report.units.len(), 5);
        assert!(report.units.iter().all(|u| u.documents.len() == 1));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.merge.concurrency = 0;
        let strategy = PathPrefixSimilarity::default();
        let err = run_pipeline(corpus(), &strategy, &config, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, CorpusMergeError::Config { .. }));
    }
}
