//! Merge serializer: joins a cluster's texts with its delimiter.

use corpusmerge_shared::{Cluster, CorpusMergeError, Delimiter, MergedUnit, Result};

/// Serialize `cluster` into a [`MergedUnit`].
///
/// Texts are joined in cluster order; a singleton serializes to its text
/// unchanged. The unit's output path is the first document's path.
pub fn serialize_cluster(
    cluster_index: usize,
    cluster: Cluster,
    delimiter: Delimiter,
) -> Result<MergedUnit> {
    let Some(first) = cluster.documents.first() else {
        return Err(CorpusMergeError::EmptyCluster { cluster_index });
    };
    let output_path = first.path.clone();

    let capacity = cluster.texts().map(str::len).sum::<usize>()
        + delimiter.value.len() * (cluster.len() - 1);
    let mut serialized_text = String::with_capacity(capacity);
    for (i, text) in cluster.texts().enumerate() {
        if i > 0 {
            serialized_text.push_str(&delimiter.value);
        }
        serialized_text.push_str(text);
    }

    Ok(MergedUnit {
        output_path,
        cluster_index,
        documents: cluster,
        delimiter,
        serialized_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpusmerge_shared::Document;

    fn cluster(docs: &[(&str, &str)]) -> Cluster {
        Cluster::from_members(
            docs.iter()
                .enumerate()
                .map(|(i, (p, t))| (i, Document::new(*p, *t)))
                .collect(),
        )
    }

    #[test]
    fn joins_with_delimiter() {
        let unit = serialize_cluster(
            0,
            cluster(&[("a.md", "Hello"), ("b.md", "World")]),
            Delimiter::literal("<|SEP-abc123|>"),
        )
        .unwrap();
        assert_eq!(unit.serialized_text, "Hello<|SEP-abc123|>World");
        assert_eq!(unit.output_path, "a.md");
    }

    #[test]
    fn singleton_is_verbatim() {
        let unit = serialize_cluster(
            3,
            cluster(&[("only.md", "# Title\n\nBody\n")]),
            Delimiter::literal("<|SEP-x|>"),
        )
        .unwrap();
        assert_eq!(unit.serialized_text, "# Title\n\nBody\n");
        assert_eq!(unit.cluster_index, 3);
    }

    #[test]
    fn empty_documents_keep_their_slots() {
        let unit = serialize_cluster(
            0,
            cluster(&[("a.md", ""), ("b.md", ""), ("c.md", "z")]),
            Delimiter::literal("|"),
        )
        .unwrap();
        assert_eq!(unit.serialized_text, "||z");
    }

    #[test]
    fn empty_cluster_is_an_error() {
        let err = serialize_cluster(7, Cluster::default(), Delimiter::literal("|")).unwrap_err();
        assert!(matches!(err, CorpusMergeError::EmptyCluster { cluster_index: 7 }));
    }
}
