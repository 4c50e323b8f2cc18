//! Document registry: one record per ingested document

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentStats};

use super::database::Database;

/// Sole writer of document metadata
pub struct DocumentRegistry {
    db: Arc<Database>,
}

impl DocumentRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a document, returning its id
    ///
    /// Re-registering an existing id keeps the original upload time.
    pub fn register(&self, doc: &Document) -> Result<String> {
        let mut record = doc.clone();
        if let Some(existing) = self.db.get_document(&doc.id)? {
            record.uploaded_at = existing.uploaded_at;
        }
        self.db.upsert_document(&record)?;
        tracing::debug!("Registered document {} ({})", record.filename, record.id);
        Ok(record.id)
    }

    /// Look up a document by content fingerprint
    pub fn exists(&self, fingerprint: &str) -> Result<Option<Document>> {
        self.db.get_document(fingerprint)
    }

    /// Get a document by id, failing with `DocumentNotFound`
    pub fn get(&self, id: &str) -> Result<Document> {
        self.db
            .get_document(id)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// All documents, newest upload first
    pub fn list(&self) -> Result<Vec<Document>> {
        self.db.list_documents()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.db.document_totals()?.0 == 0)
    }

    /// Remove a document record
    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.db.delete_document(id)? {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Registry-side statistics; `total_fragments` sums the recorded counts
    pub fn stats(&self) -> Result<DocumentStats> {
        let documents = self.db.list_documents()?;
        let fragments = documents.iter().map(|d| d.fragment_count).sum();
        let size = documents.iter().map(|d| d.file_size).sum();
        Ok(DocumentStats::new(documents.len(), fragments, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DocumentRegistry {
        DocumentRegistry::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_register_and_exists() {
        let registry = registry();
        assert!(registry.is_empty().unwrap());

        let doc = Document::new("f1".into(), "report.pdf".into(), 2048, 4);
        assert_eq!(registry.register(&doc).unwrap(), "f1");

        let found = registry.exists("f1").unwrap().unwrap();
        assert_eq!(found.filename, "report.pdf");
        assert!(registry.exists("nope").unwrap().is_none());
        assert!(!registry.is_empty().unwrap());
    }

    #[test]
    fn test_reregister_keeps_upload_time() {
        let registry = registry();
        let mut doc = Document::new("f1".into(), "a.txt".into(), 10, 1);
        doc.uploaded_at = doc.uploaded_at - chrono::Duration::days(1);
        registry.register(&doc).unwrap();

        let update = Document::new("f1".into(), "a.txt".into(), 10, 3);
        registry.register(&update).unwrap();

        let stored = registry.get("f1").unwrap();
        assert_eq!(stored.fragment_count, 3);
        assert!(stored.uploaded_at < update.uploaded_at);
    }

    #[test]
    fn test_delete_unknown() {
        let registry = registry();
        assert!(matches!(registry.delete("x"), Err(Error::DocumentNotFound(_))));
        assert!(matches!(registry.get("x"), Err(Error::DocumentNotFound(_))));
    }

    #[test]
    fn test_stats() {
        let registry = registry();
        registry.register(&Document::new("a".into(), "a.txt".into(), 1024 * 1024, 3)).unwrap();
        registry.register(&Document::new("b".into(), "b.txt".into(), 1024 * 1024, 2)).unwrap();

        let stats = registry.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_fragments, 5);
        assert_eq!(stats.total_size_mb, 2.0);
    }
}
