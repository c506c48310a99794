//! # Document File Storage
//!
//! Uploaded files live on the local filesystem under the media root, at the
//! relative path recorded in `Document::file_path`
//! (`documents/{user_id}/{document_id}.{ext}`).

use std::io;
use std::path::{Component, Path, PathBuf};

/// Filesystem store rooted at `MEDIA_ROOT`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a stored relative path. Only plain relative
    /// paths are accepted, so a record can never address a file outside
    /// the media root.
    fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let rel = Path::new(relative);
        let plain = !relative.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing storage path {relative:?}"),
            ));
        }
        Ok(self.root.join(rel))
    }

    /// Write `bytes` to `relative`, creating parent directories.
    pub async fn save(&self, relative: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await
    }

    pub async fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(relative)?).await
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.resolve(relative)?).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Best-effort removal of many files; failures are logged.
    pub async fn remove_all(&self, paths: Vec<String>) {
        for path in paths {
            if let Err(e) = self.remove(&path).await {
                tracing::warn!(path = %path, error = %e, "failed to remove document file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let rel = "documents/u1/d1.pdf";

        storage.save(rel, b"%PDF-1.4").await.unwrap();
        assert!(dir.path().join(rel).exists());
        assert_eq!(storage.read(rel).await.unwrap(), b"%PDF-1.4");

        storage.remove(rel).await.unwrap();
        assert!(!dir.path().join(rel).exists());
        // Second removal is a no-op.
        storage.remove(rel).await.unwrap();
    }

    #[tokio::test]
    async fn remove_all_skips_bad_paths_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.save("documents/u1/a.pdf", b"a").await.unwrap();
        storage.save("documents/u1/b.pdf", b"b").await.unwrap();

        storage
            .remove_all(vec![
                "documents/u1/a.pdf".to_string(),
                "../outside.pdf".to_string(),
                "documents/u1/b.pdf".to_string(),
            ])
            .await;
        assert!(!dir.path().join("documents/u1/a.pdf").exists());
        assert!(!dir.path().join("documents/u1/b.pdf").exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let err = storage.read("documents/u1/none.pdf").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn paths_escaping_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        for bad in ["../etc/passwd", "/etc/passwd", "documents/../../x", ""] {
            let err = storage.save(bad, b"x").await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{bad}");
        }
    }
}
