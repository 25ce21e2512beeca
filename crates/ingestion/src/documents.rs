//! Plain-text document store
//!
//! Scraped pages are kept as one `.txt` file each in a flat directory.

use crate::errors::{IngestionError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One scraped page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name the text was read from
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// File name for the `index`-th scraped page
pub fn page_file_name(index: usize) -> String {
    format!("page_{}.txt", index)
}

/// Read every `*.txt` file in `dir`, ordered by file name.
///
/// Subdirectories and other extensions are ignored.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !tokio::fs::try_exists(dir).await? {
        return Err(IngestionError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path.extension().is_some_and(|ext| ext == "txt");
        if is_txt && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| IngestionError::ReadDocument {
                path: path.display().to_string(),
                source,
            })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!(source = %source, bytes = text.len(), "Loaded document");
        docs.push(Document::new(source, text));
    }

    info!(dir = %dir.display(), count = docs.len(), "Documents loaded");
    Ok(docs)
}

/// Write `text` to `dir/name`, creating `dir` when missing
pub async fn write_document(dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, text)
        .await
        .map_err(|source| IngestionError::WriteDocument {
            path: path.display().to_string(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_sorted_txt_only() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "page_1.txt", "second").await.unwrap();
        write_document(dir.path(), "page_0.txt", "first").await.unwrap();
        write_document(dir.path(), "notes.md", "ignored").await.unwrap();
        tokio::fs::create_dir(dir.path().join("nested.txt")).await.unwrap();

        let docs = load_documents(dir.path()).await.unwrap();
        assert_eq!(
            docs,
            vec![
                Document::new("page_0.txt", "first"),
                Document::new("page_1.txt", "second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data").join("docs");
        let path = write_document(&target, &page_file_name(3), "Aspirin reduces fever.")
            .await
            .unwrap();

        assert_eq!(path, target.join("page_3.txt"));
        assert_eq!(
            tokio::fs::read_to_string(path).await.unwrap(),
            "Aspirin reduces fever."
        );
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_documents(&dir.path().join("absent")).await;
        assert!(matches!(result, Err(IngestionError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_documents(dir.path()).await.unwrap().is_empty());
    }
}
