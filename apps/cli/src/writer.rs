//! Corpus writer: persists a listing and its manifest sidecar.
//!
//! Both files are written atomically (write to temp, then rename).

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use corpusmerge_shared::{CURRENT_SCHEMA_VERSION, CorpusManifest, CorpusMergeError, Result};

/// `<listing>.manifest.json` next to the listing.
pub(crate) fn manifest_path_for(listing: &Path) -> PathBuf {
    let mut name = listing
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".manifest.json");
    listing.with_file_name(name)
}

/// Write the listing and manifest. Returns the manifest path.
pub(crate) fn write_corpus(
    listing_path: &Path,
    listing: &str,
    manifest: &CorpusManifest,
) -> Result<PathBuf> {
    if let Some(parent) = listing_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CorpusMergeError::io(parent, e))?;
    }

    write_atomic(listing_path, listing)?;

    let manifest_path = manifest_path_for(listing_path);
    let json = serde_json::to_string_pretty(manifest).map_err(|e| {
        CorpusMergeError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(&manifest_path, &json)?;

    info!(
        listing = %listing_path.display(),
        units = manifest.units.len(),
        "corpus written"
    );
    Ok(manifest_path)
}

/// Read a listing and its manifest back.
pub(crate) fn read_corpus(listing_path: &Path) -> Result<(String, CorpusManifest)> {
    let listing = std::fs::read_to_string(listing_path)
        .map_err(|e| CorpusMergeError::io(listing_path, e))?;

    let manifest_path = manifest_path_for(listing_path);
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| CorpusMergeError::io(&manifest_path, e))?;
    let manifest: CorpusManifest = serde_json::from_str(&content).map_err(|e| {
        CorpusMergeError::validation(format!("invalid {}: {e}", manifest_path.display()))
    })?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(CorpusMergeError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    Ok((listing, manifest))
}

fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CorpusMergeError::validation(format!("'{}' has no file name", target.display()))
        })?;
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| CorpusMergeError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| CorpusMergeError::io(target, e))?;

    debug!(path = %target.display(), size = content.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpusmerge_shared::{ManifestUnit, RunId};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cm-writer-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manifest() -> CorpusManifest {
        CorpusManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0-test".into(),
            created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            strategy: "path-prefix".into(),
            threshold: 0.5,
            document_count: 1,
            units: vec![ManifestUnit {
                output_path: "index.md".into(),
                delimiter: "<|S|>".into(),
                documents: vec!["index.md".into()],
                sha256: String::new(),
                size_bytes: 4,
            }],
            failures: vec![],
        }
    }

    #[test]
    fn manifest_sits_next_to_listing() {
        assert_eq!(
            manifest_path_for(Path::new("out/corpus.txt")),
            PathBuf::from("out/corpus.txt.manifest.json")
        );
    }

    #[test]
    fn write_then_read() {
        let tmp = temp_dir();
        let listing_path = tmp.join("nested/corpus.txt");

        write_corpus(&listing_path, "=== index.md ===\nHome\n", &manifest()).unwrap();
        let (listing, read_back) = read_corpus(&listing_path).unwrap();
        assert_eq!(listing, "=== index.md ===\nHome\n");
        assert_eq!(read_back.units[0].output_path, "index.md");

        // No temp files should remain
        for entry in std::fs::read_dir(tmp.join("nested")).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_rejects_unknown_schema() {
        let tmp = temp_dir();
        let listing_path = tmp.join("corpus.txt");
        let mut m = manifest();
        m.schema_version = 99;
        write_corpus(&listing_path, "", &m).unwrap();

        let err = read_corpus(&listing_path).unwrap_err();
        assert!(err.to_string().contains("schema_version"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
