//! Similarity grouper.
//!
//! Partitions the documents of a run into clusters: every pair scoring at or
//! above the threshold is joined in a run-scoped [`DisjointSet`], and each
//! connected component becomes one [`Cluster`].

use tracing::{debug, info, instrument, warn};

use corpusmerge_shared::{
    Cluster, CorpusMergeError, Document, GroupingConfig, Result, SimilarityFailurePolicy,
};

use crate::disjoint_set::DisjointSet;
use crate::similarity::SimilarityStrategy;

/// Clusters plus statistics from one grouping pass.
#[derive(Debug, Clone, Default)]
pub struct GroupingOutcome {
    /// Clusters ordered by their lowest ingestion index.
    pub clusters: Vec<Cluster>,
    /// Pairwise scores computed.
    pub comparisons: usize,
    /// Whether a strategy failure forced singleton clustering.
    pub degraded: bool,
}

/// Groups documents with a pluggable similarity strategy.
pub struct Grouper<'a> {
    strategy: &'a dyn SimilarityStrategy,
    config: &'a GroupingConfig,
}

impl<'a> Grouper<'a> {
    pub fn new(strategy: &'a dyn SimilarityStrategy, config: &'a GroupingConfig) -> Self {
        Self { strategy, config }
    }

    /// Partition `documents`; the ingestion index of a document is its position.
    #[instrument(skip_all, fields(strategy = self.strategy.name(), documents = documents.len()))]
    pub fn group(&self, documents: &[Document]) -> Result<GroupingOutcome> {
        self.config.validate()?;

        if documents.is_empty() {
            return Ok(GroupingOutcome::default());
        }

        let mut set = DisjointSet::new(documents.len());
        let mut comparisons = 0usize;

        for i in 0..documents.len() {
            for j in (i + 1)..documents.len() {
                // Already joined through another path; the score cannot change membership.
                if set.connected(i, j) {
                    continue;
                }

                comparisons += 1;
                let score = match self.strategy.score(&documents[i], &documents[j]) {
                    Ok(score) => score,
                    Err(e) => return self.on_failure(documents, &documents[i], &documents[j], e),
                };

                if score >= self.config.threshold {
                    debug!(
                        a = %documents[i].path,
                        b = %documents[j].path,
                        score,
                        "related pair"
                    );
                    set.union(i, j);
                }
            }
        }

        let clusters = self.build_clusters(documents, set.components());

        info!(
            clusters = clusters.len(),
            comparisons, "grouping complete"
        );

        Ok(GroupingOutcome {
            clusters,
            comparisons,
            degraded: false,
        })
    }

    fn on_failure(
        &self,
        documents: &[Document],
        a: &Document,
        b: &Document,
        error: crate::similarity::SimilarityError,
    ) -> Result<GroupingOutcome> {
        match self.config.on_similarity_failure {
            SimilarityFailurePolicy::Abort => Err(CorpusMergeError::clustering(
                self.strategy.name(),
                format!("scoring {} against {}: {error}", a.path, b.path),
            )),
            SimilarityFailurePolicy::Singleton => {
                warn!(
                    strategy = self.strategy.name(),
                    error = %error,
                    "similarity strategy failed, degrading to singleton clusters"
                );
                Ok(GroupingOutcome {
                    clusters: singletons(documents),
                    comparisons: 0,
                    degraded: true,
                })
            }
        }
    }

    /// Turn components into clusters, chunking any that exceed the size cap.
    fn build_clusters(&self, documents: &[Document], components: Vec<Vec<usize>>) -> Vec<Cluster> {
        let cap = self.config.max_cluster_size.unwrap_or(usize::MAX).max(1);
        let mut clusters = Vec::with_capacity(components.len());

        for component in components {
            if component.len() > cap {
                debug!(
                    size = component.len(),
                    cap, "splitting oversized cluster"
                );
            }
            for chunk in component.chunks(cap) {
                let members = chunk.iter().map(|&i| (i, documents[i].clone())).collect();
                clusters.push(Cluster::from_members(members));
            }
        }

        clusters
    }
}

/// One cluster per document, in ingestion order.
pub fn singletons(documents: &[Document]) -> Vec<Cluster> {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| Cluster::from_members(vec![(i, doc.clone())]))
        .collect()
}
