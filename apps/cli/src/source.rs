//! Directory document source.
//!
//! Walks an input directory and turns every matching file into a
//! [`Document`]. Paths are `/`-separated and relative to the root; the
//! resulting list is sorted by path so ingestion order is reproducible.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use corpusmerge_shared::{CorpusMergeError, Document, Result};

/// Load every file under `root` whose extension is in `extensions`.
///
/// Symlinks are followed. Hidden files and directories are skipped, as are
/// files that are not valid UTF-8 and entries the walker cannot read.
pub(crate) fn load_documents(root: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(CorpusMergeError::validation(format!(
            "input '{}' is not a directory",
            root.display()
        )));
    }

    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path()) {
            entries.push((rel, entry.into_path()));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::with_capacity(entries.len());
    for (rel, path) in entries {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %rel, bytes = text.len(), "loaded document");
                documents.push(Document::new(rel, text));
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(path = %rel, "skipping non-UTF-8 file");
            }
            Err(e) => return Err(CorpusMergeError::io(&path, e)),
        }
    }

    Ok(documents)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// `/`-joined path of `path` relative to `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cm-source-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn md_only() -> Vec<String> {
        vec!["md".into()]
    }

    #[test]
    fn loads_matching_files_sorted_by_path() {
        let tmp = temp_dir();
        write(&tmp, "guide/setup.md", b"# Setup");
        write(&tmp, "index.md", b"# Home");
        write(&tmp, "guide/intro.MD", b"# Intro");
        write(&tmp, "image.png", b"\x89PNG");

        let docs = load_documents(&tmp, &md_only()).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["guide/intro.MD", "guide/setup.md", "index.md"]);
        assert_eq!(docs[2].text, "# Home");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn skips_hidden_entries_and_invalid_utf8() {
        let tmp = temp_dir();
        write(&tmp, ".git/notes.md", b"hidden");
        write(&tmp, ".draft.md", b"hidden");
        write(&tmp, "binary.md", &[0xff, 0xfe, 0x00]);
        write(&tmp, "ok.md", b"fine");

        let docs = load_documents(&tmp, &md_only()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "ok.md");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files_and_directories() {
        let tmp = temp_dir();
        let outside = temp_dir();
        write(&outside, "shared/notes.md", b"# Notes");
        write(&outside, "single.md", b"# Single");
        std::fs::create_dir_all(tmp.join("docs")).unwrap();
        std::os::unix::fs::symlink(outside.join("shared"), tmp.join("docs/linked")).unwrap();
        std::os::unix::fs::symlink(outside.join("single.md"), tmp.join("docs/single.md")).unwrap();

        let docs = load_documents(&tmp, &md_only()).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/linked/notes.md", "docs/single.md"]);
        assert_eq!(docs[1].text, "# Single");

        let _ = std::fs::remove_dir_all(&tmp);
        let _ = std::fs::remove_dir_all(&outside);
    }

    #[test]
    fn hidden_root_is_still_walked() {
        let tmp = temp_dir();
        let root = tmp.join(".corpus");
        write(&root, "page.md", b"# Page");

        let docs = load_documents(&root, &md_only()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "page.md");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = temp_dir().join("does-not-exist");
        let err = load_documents(&tmp, &md_only()).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
