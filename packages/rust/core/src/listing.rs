//! Corpus listing rendering and parsing.
//!
//! A listing is a flat text file with one section per merged unit:
//!
//! ```text
//! === guide/intro.md ===
//! <serialized text>
//! === index.md ===
//! <serialized text>
//! ```
//!
//! The manifest records each unit's byte size, so parsing slices bodies by
//! length instead of searching for the next header.

use chrono::Utc;
use sha2::{Digest, Sha256};

use corpusmerge_shared::{
    CURRENT_SCHEMA_VERSION, CorpusManifest, CorpusMergeError, ManifestFailure, ManifestUnit,
    MergedUnit, Result, RunId,
};

use crate::pipeline::MergeReport;

/// Header line for a unit, without the trailing newline.
pub fn header_line(path: &str) -> String {
    format!("=== {path} ===")
}

/// Render units back-to-back, each under its own header.
pub fn render_listing(units: &[MergedUnit]) -> String {
    let capacity = units
        .iter()
        .map(|u| u.serialized_text.len() + u.output_path.len() + 10)
        .sum();
    let mut out = String::with_capacity(capacity);
    for unit in units {
        out.push_str(&header_line(&unit.output_path));
        out.push('\n');
        out.push_str(&unit.serialized_text);
        out.push('\n');
    }
    out
}

/// Slice a listing into unit bodies using the manifest's paths and sizes.
pub fn parse_listing<'t>(listing: &'t str, units: &[ManifestUnit]) -> Result<Vec<&'t str>> {
    let mut bodies = Vec::with_capacity(units.len());
    let mut cursor = 0usize;

    for unit in units {
        let header = header_line(&unit.output_path);
        let rest = &listing[cursor..];
        if !rest.starts_with(&header) || !rest[header.len()..].starts_with('\n') {
            return Err(CorpusMergeError::validation(format!(
                "expected header '{header}' at byte {cursor}"
            )));
        }
        cursor += header.len() + 1;

        let truncated = || {
            CorpusMergeError::validation(format!(
                "listing truncated inside {} (needs {} bytes)",
                unit.output_path, unit.size_bytes
            ))
        };
        let end = cursor.checked_add(unit.size_bytes).ok_or_else(truncated)?;
        let body = listing.get(cursor..end).ok_or_else(truncated)?;
        cursor = end;

        if !listing[cursor..].starts_with('\n') {
            return Err(CorpusMergeError::validation(format!(
                "missing newline after {}",
                unit.output_path
            )));
        }
        cursor += 1;
        bodies.push(body);
    }

    if cursor != listing.len() {
        return Err(CorpusMergeError::validation(format!(
            "{} unexpected trailing bytes after last unit",
            listing.len() - cursor
        )));
    }

    Ok(bodies)
}

/// Hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the manifest sidecar for a finished run.
pub fn build_manifest(report: &MergeReport, threshold: f64, tool_version: &str) -> CorpusManifest {
    let units = report
        .units
        .iter()
        .map(|unit| ManifestUnit {
            output_path: unit.output_path.clone(),
            delimiter: unit.delimiter.value.clone(),
            documents: unit.documents.paths(),
            sha256: sha256_hex(&unit.serialized_text),
            size_bytes: unit.serialized_text.len(),
        })
        .collect();

    let failures = report
        .failures
        .iter()
        .map(|f| ManifestFailure {
            cluster_index: f.cluster_index,
            documents: f.documents.clone(),
            error: f.error.clone(),
        })
        .collect();

    CorpusManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: RunId::new(),
        tool_version: tool_version.to_string(),
        created_at: Utc::now(),
        strategy: report.strategy.clone(),
        threshold,
        document_count: report.document_count,
        units,
        failures,
    }
}
