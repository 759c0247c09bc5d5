//! Directory loader for attachments.
//!
//! Reads every matching file currently present in the watched directory.
//! The loader never looks at watcher event payloads; each rebuild sees the
//! directory as it is when the rebuild starts.

use crate::config::FileFilter;
use crate::parser::{self, ContentType};
use crate::types::Document;
use courier_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Loads documents from one directory.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
    filter: FileFilter,
    recursive: bool,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>, filter: FileFilter) -> Self {
        Self {
            dir: dir.into(),
            filter,
            recursive: false,
        }
    }

    /// Descend into subdirectories.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Load all matching documents in sorted path order.
    ///
    /// A missing directory yields an empty list. Files that cannot be read
    /// or parsed are logged and skipped.
    pub fn load(&self) -> AppResult<Vec<Document>> {
        if !self.dir.exists() {
            tracing::debug!("Source directory {:?} does not exist yet", self.dir);
            return Ok(Vec::new());
        }

        if !self.dir.is_dir() {
            return Err(AppError::Index(format!(
                "Source path is not a directory: {:?}",
                self.dir
            )));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", self.dir, e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.filter.matches(path) {
                continue;
            }

            match load_document(path) {
                Ok(document) => documents.push(document),
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }

        tracing::debug!(
            "Loaded {} documents from {:?}",
            documents.len(),
            self.dir
        );

        Ok(documents)
    }
}

fn load_document(path: &Path) -> AppResult<Document> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::Index(format!("Failed to read {:?}: {}", path, e)))?;

    // Hash and text come from the same read
    let text = parser::parse_bytes(path, &bytes)?;

    Ok(Document {
        path: path.to_path_buf(),
        content_type: ContentType::from_path(path).as_str().to_string(),
        text,
        size_bytes: bytes.len() as u64,
        sha256: hex_digest(&bytes),
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let loader = DirectoryLoader::new(temp.path().join("nope"), FileFilter::default());
        assert!(loader.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.txt", "second");
        write(temp.path(), "a.md", "# first");
        write(temp.path(), "c.jpg", "ignored");
        write(temp.path(), ".hidden.txt", "ignored");

        let loader = DirectoryLoader::new(temp.path(), FileFilter::default());
        let docs = loader.load().unwrap();

        let names: Vec<_> = docs
            .iter()
            .map(|d| d.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(docs[0].text, "first");
        assert_eq!(docs[1].content_type, "text");
        assert_eq!(docs[1].size_bytes, 6);
    }

    #[test]
    fn test_sha256_recorded() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.txt", "abc");

        let docs = DirectoryLoader::new(temp.path(), FileFilter::default())
            .load()
            .unwrap();
        assert_eq!(
            docs[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_describes_indexed_text() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "memo.txt", "Pickup moved to gate 4.");

        let docs = DirectoryLoader::new(temp.path(), FileFilter::default())
            .load()
            .unwrap();
        assert_eq!(docs[0].sha256, hex_digest(docs[0].text.as_bytes()));
        assert_eq!(docs[0].size_bytes, docs[0].text.len() as u64);
    }

    #[test]
    fn test_bad_file_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "good.txt", "fine");
        fs::write(temp.path().join("broken.pdf"), b"not a pdf").unwrap();

        let docs = DirectoryLoader::new(temp.path(), FileFilter::default())
            .load()
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].path.ends_with("good.txt"));
    }

    #[test]
    fn test_recursive_flag() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        write(temp.path(), "top.txt", "top");
        write(&temp.path().join("sub"), "nested.txt", "nested");

        let flat = DirectoryLoader::new(temp.path(), FileFilter::default());
        assert_eq!(flat.load().unwrap().len(), 1);

        let deep = flat.recursive(true);
        assert_eq!(deep.load().unwrap().len(), 2);
    }
}
