//! Persisted source files, kept for audit and re-processing

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Stores uploads under `<root>/<document_id>/<filename>`
pub struct SourceStore {
    root: PathBuf,
}

impl SourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a document's source file is stored at
    pub fn path_for(&self, document_id: &str, filename: &str) -> PathBuf {
        self.root.join(document_id).join(safe_filename(filename))
    }

    /// Write the source file, replacing any previous copy for this document
    pub async fn save(&self, document_id: &str, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.root.join(document_id);
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.path_for(document_id, filename);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Remove a document's source file; missing files are not an error
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let dir = self.root.join(document_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Final path component only, so uploads cannot escape their directory
fn safe_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("report.pdf"), "report.pdf");
        assert_eq!(safe_filename(".."), "upload");
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().join("documents")).unwrap();

        let path = store.save("abc", "notes.txt", b"hello").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");

        let renamed = store.save("abc", "renamed.txt", b"hello").await.unwrap();
        assert!(!path.exists());
        assert!(renamed.exists());

        store.delete("abc").await.unwrap();
        assert!(!renamed.exists());
        store.delete("abc").await.unwrap();
    }
}
