//! Splitter / validator: the inverse of the merge serializer.
//!
//! Used as a round-trip oracle by tests and by `corpusmerge verify`; it is
//! not a recovery path for corrupted output.

use corpusmerge_shared::{CorpusMergeError, Delimiter, MergedUnit, Result};

/// Split `text` on exact occurrences of `delimiter`.
pub fn split<'t>(text: &'t str, delimiter: &Delimiter) -> Vec<&'t str> {
    if delimiter.value.is_empty() {
        return vec![text];
    }
    text.split(delimiter.as_str()).collect()
}

/// Split `text` and check that it holds exactly `expected` documents.
pub fn split_expecting<'t>(
    text: &'t str,
    delimiter: &Delimiter,
    expected: usize,
    output_path: &str,
) -> Result<Vec<&'t str>> {
    if expected >= 2 && (delimiter.value.is_empty() || !text.contains(delimiter.as_str())) {
        return Err(CorpusMergeError::DelimiterNotFound {
            output_path: output_path.to_string(),
            delimiter: delimiter.value.clone(),
        });
    }

    let pieces = if expected <= 1 {
        vec![text]
    } else {
        split(text, delimiter)
    };

    if pieces.len() != expected {
        return Err(CorpusMergeError::RoundTripMismatch {
            output_path: output_path.to_string(),
            details: format!("expected {expected} documents, found {}", pieces.len()),
        });
    }

    Ok(pieces)
}

/// Check that splitting `unit` reproduces its documents exactly.
pub fn verify_unit(unit: &MergedUnit) -> Result<()> {
    if unit.documents.is_empty() {
        return Err(CorpusMergeError::EmptyCluster {
            cluster_index: unit.cluster_index,
        });
    }

    let pieces = split_expecting(
        &unit.serialized_text,
        &unit.delimiter,
        unit.documents.len(),
        &unit.output_path,
    )?;

    for (piece, doc) in pieces.iter().zip(&unit.documents.documents) {
        if *piece != doc.text {
            return Err(CorpusMergeError::RoundTripMismatch {
                output_path: unit.output_path.clone(),
                details: format!("content of {} differs after split", doc.path),
            });
        }
    }

    Ok(())
}
