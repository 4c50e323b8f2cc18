//! SQLite database for documents, fragments and index metadata
//!
//! One connection guarded by a mutex. Document rows belong to the
//! registry, fragment and index_meta rows to the embedding index.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Document, Fragment};

/// Persisted fragment with its global insertion sequence
#[derive(Debug, Clone)]
pub struct FragmentRecord {
    /// Autoincrement rowid; orders fragments across the whole index
    pub seq: i64,
    pub fragment: Fragment,
    pub embedding: Vec<f32>,
}

/// Model and dimensionality the stored vectors were produced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub model: String,
    pub dimensions: usize,
}

/// SQLite-backed store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(true)?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(false)?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self, on_disk: bool) -> Result<()> {
        let conn = self.conn.lock();

        if on_disk {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA temp_store=MEMORY;
            "#,
            )?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                media_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                fragment_count INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at ON documents(uploaded_at);

            CREATE TABLE IF NOT EXISTS fragments (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                modality TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fragments_document_id ON fragments(document_id);

            CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                model TEXT NOT NULL,
                dimensions INTEGER NOT NULL
            );
        "#,
        )?;

        tracing::debug!("Database migrations complete");
        Ok(())
    }

    // ==================== Documents ====================

    /// Insert or replace a document record
    pub fn upsert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO documents (
                id, filename, file_type, media_type, file_size, fragment_count, uploaded_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                file_type = excluded.file_type,
                media_type = excluded.media_type,
                file_size = excluded.file_size,
                fragment_count = excluded.fragment_count,
                updated_at = excluded.updated_at
            "#,
            params![
                doc.id,
                doc.filename,
                doc.file_type.as_str(),
                doc.media_type,
                doc.file_size as i64,
                doc.fragment_count as i64,
                timestamp(&doc.uploaded_at),
                timestamp(&doc.updated_at),
            ],
        )?;

        Ok(())
    }

    /// Get a document by id
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![id],
                DocumentRow::from_row,
            )
            .optional()?;

        row.map(DocumentRow::into_document).transpose()
    }

    /// All documents, newest upload first
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock();

        let mut stmt =
            conn.prepare("SELECT * FROM documents ORDER BY uploaded_at DESC, rowid DESC")?;
        let rows = stmt
            .query_map([], DocumentRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    /// Delete a document record
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// (document count, total bytes)
    pub fn document_totals(&self) -> Result<(usize, u64)> {
        let conn = self.conn.lock();
        let (count, size): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count as usize, size as u64))
    }

    // ==================== Fragments ====================

    /// Every fragment in insertion order
    pub fn load_fragments(&self) -> Result<Vec<FragmentRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT seq, document_id, filename, chunk_index, content, modality, embedding
             FROM fragments ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Vec<u8>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(seq, document_id, filename, chunk_index, content, modality, blob)| {
                Ok(FragmentRecord {
                    seq,
                    fragment: Fragment {
                        document_id,
                        filename,
                        chunk_index: chunk_index as usize,
                        content,
                        modality: modality.parse()?,
                    },
                    embedding: decode_embedding(&blob)?,
                })
            })
            .collect()
    }

    /// Atomically replace all fragments of one document, returning the new records
    pub fn replace_fragments(
        &self,
        document_id: &str,
        fragments: Vec<(Fragment, Vec<f32>)>,
    ) -> Result<Vec<FragmentRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM fragments WHERE document_id = ?1",
            params![document_id],
        )?;

        let mut records = Vec::with_capacity(fragments.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fragments (document_id, filename, chunk_index, content, modality, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;

            for (fragment, embedding) in fragments {
                stmt.execute(params![
                    fragment.document_id,
                    fragment.filename,
                    fragment.chunk_index as i64,
                    fragment.content,
                    fragment.modality.as_str(),
                    encode_embedding(&embedding),
                ])?;
                records.push(FragmentRecord {
                    seq: tx.last_insert_rowid(),
                    fragment,
                    embedding,
                });
            }
        }

        tx.commit()?;
        Ok(records)
    }

    /// Put back a document's earlier fragments under their original sequence numbers
    pub fn restore_fragments(&self, document_id: &str, records: &[FragmentRecord]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM fragments WHERE document_id = ?1",
            params![document_id],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fragments (seq, document_id, filename, chunk_index, content, modality, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for record in records {
                let fragment = &record.fragment;
                stmt.execute(params![
                    record.seq,
                    fragment.document_id,
                    fragment.filename,
                    fragment.chunk_index as i64,
                    fragment.content,
                    fragment.modality.as_str(),
                    encode_embedding(&record.embedding),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Overwrite the vectors of existing fragments, keeping their sequence
    pub fn update_embeddings(&self, updates: &[(i64, Vec<f32>)]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE fragments SET embedding = ?1 WHERE seq = ?2")?;
            for (seq, embedding) in updates {
                stmt.execute(params![encode_embedding(embedding), seq])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete all fragments of a document
    pub fn delete_fragments(&self, document_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM fragments WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(count)
    }

    // ==================== Index metadata ====================

    pub fn index_meta(&self) -> Result<Option<IndexMeta>> {
        let conn = self.conn.lock();
        let meta = conn
            .query_row(
                "SELECT model, dimensions FROM index_meta WHERE id = 1",
                [],
                |row| {
                    Ok(IndexMeta {
                        model: row.get(0)?,
                        dimensions: row.get::<_, i64>(1)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    pub fn set_index_meta(&self, meta: &IndexMeta) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO index_meta (id, model, dimensions) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET model = excluded.model, dimensions = excluded.dimensions",
            params![meta.model, meta.dimensions as i64],
        )?;
        Ok(())
    }
}

struct DocumentRow {
    id: String,
    filename: String,
    file_type: String,
    media_type: String,
    file_size: i64,
    fragment_count: i64,
    uploaded_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            file_type: row.get("file_type")?,
            media_type: row.get("media_type")?,
            file_size: row.get("file_size")?,
            fragment_count: row.get("fragment_count")?,
            uploaded_at: row.get("uploaded_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_document(self) -> Result<Document> {
        Ok(Document {
            id: self.id,
            filename: self.filename,
            file_type: self.file_type.parse()?,
            media_type: self.media_type,
            file_size: self.file_size as u64,
            fragment_count: self.fragment_count as usize,
            uploaded_at: parse_timestamp(&self.uploaded_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Fixed-width UTC form so text ordering matches time ordering
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("bad timestamp '{}': {}", s, e)))
}

/// Little-endian f32 encoding
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::storage(format!(
            "embedding blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
