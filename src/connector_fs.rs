//! Corpus scanner.
//!
//! Walks the corpus root, keeps files matching the include globs (minus the
//! excludes), and turns each into a [`Document`]. Results are sorted by
//! relative path so index builds are deterministic.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{RagError, RagResult};
use crate::models::Document;

pub fn scan_corpus(config: &CorpusConfig) -> RagResult<Vec<Document>> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(RagError::CorpusUnavailable(format!(
            "corpus root does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.map_err(|e| RagError::CorpusUnavailable(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        if let Some(doc) = read_document(path, &rel_str) {
            documents.push(doc);
        }
    }

    documents.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    debug!(root = %root.display(), count = documents.len(), "scanned corpus");

    Ok(documents)
}

/// Skips unreadable or non-UTF-8 files with a warning rather than failing the scan.
fn read_document(path: &Path, relative_path: &str) -> Option<Document> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };

    if text.trim().is_empty() {
        return None;
    }

    Some(Document {
        id: document_id(relative_path),
        text,
        source_path: relative_path.to_string(),
    })
}

pub fn document_id(source_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> RagResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            RagError::CorpusUnavailable(format!("invalid glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::CorpusUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec![],
            follow_symlinks: false,
            allow_empty: false,
        }
    }

    #[test]
    fn test_scan_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("flights")).unwrap();
        fs::write(tmp.path().join("flights/ift5.txt"), "IFT-5 catch").unwrap();
        fs::write(tmp.path().join("raptor.md"), "# Raptor").unwrap();
        fs::write(tmp.path().join("image.png"), "not text").unwrap();
        fs::write(tmp.path().join(".hidden.txt"), "secret").unwrap();

        let docs = scan_corpus(&corpus(tmp.path())).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(paths, vec!["flights/ift5.txt", "raptor.md"]);
        assert_eq!(docs[0].id, document_id("flights/ift5.txt"));
    }

    #[test]
    fn test_blank_files_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.txt"), "  \n\n ").unwrap();
        let docs = scan_corpus(&corpus(tmp.path())).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.txt"), "keep").unwrap();
        fs::write(tmp.path().join("draft.txt"), "drop").unwrap();
        let mut config = corpus(tmp.path());
        config.exclude_globs = vec!["draft.txt".to_string()];
        let docs = scan_corpus(&config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_path, "keep.txt");
    }

    #[test]
    fn test_missing_root_is_corpus_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = scan_corpus(&corpus(&tmp.path().join("nope"))).unwrap_err();
        assert!(matches!(err, RagError::CorpusUnavailable(_)));
    }

    #[test]
    fn test_document_id_stable() {
        assert_eq!(document_id("a.txt"), document_id("a.txt"));
        assert_ne!(document_id("a.txt"), document_id("b.txt"));
        assert_eq!(document_id("a.txt").len(), 64);
    }
}
