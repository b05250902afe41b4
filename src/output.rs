//! JSON file sink for fetched documents.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::error::YuqueError;
use crate::model::DocDetail;
use crate::pipeline::DocSink;

/// Writes each document to `{dir}/{doc_id}.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Creates a sink writing into `dir`, which must exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates `dir` and its parents, then a sink writing into it.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::Io`] when the directory cannot be created.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, YuqueError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|error| YuqueError::io(&dir, error))?;
        debug!(dir = %dir.display(), "output directory ready");
        Ok(Self { dir })
    }

    /// Returns the target file for `doc_id`.
    #[must_use]
    pub fn path_for(&self, doc_id: &str) -> PathBuf {
        let name: String = doc_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl DocSink for JsonDirSink {
    async fn on_document(
        &self,
        doc: &DocDetail,
        completed: usize,
        total: usize,
    ) -> anyhow::Result<()> {
        let path = self.path_for(&doc.doc_id);
        let json = serde_json::to_vec_pretty(doc)
            .with_context(|| format!("serializing document {}", doc.doc_id))?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), completed, total, "wrote document");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_path_for_replaces_separators() {
        let sink = JsonDirSink::new("/out");
        assert_eq!(sink.path_for("a/b:c"), PathBuf::from("/out/a_b_c.json"));
    }

    #[tokio::test]
    async fn test_on_document_writes_json() {
        let dir = TempDir::new().unwrap();
        let sink = JsonDirSink::new(dir.path());
        let doc = DocDetail::from_markdown("intro", "# Intro".to_string(), None);

        sink.on_document(&doc, 1, 1).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("intro.json")).unwrap();
        let parsed: DocDetail = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.body, "# Intro");
    }

    #[tokio::test]
    async fn test_create_makes_nested_dir() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        let sink = JsonDirSink::create(&target).await.unwrap();
        assert!(target.is_dir());
        assert_eq!(sink.path_for("x"), target.join("x.json"));
    }

    #[tokio::test]
    async fn test_create_over_a_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        let err = JsonDirSink::create(&file).await.unwrap_err();
        assert!(matches!(err, YuqueError::Io { ref path, .. } if *path == file));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_on_document_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let sink = JsonDirSink::new(dir.path().join("missing"));
        let doc = DocDetail::from_markdown("intro", String::new(), None);
        assert!(sink.on_document(&doc, 1, 1).await.is_err());
    }
}
