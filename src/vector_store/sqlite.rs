//! SQLite-based vector store implementation.
//!
//! Uses SQLite with similarity computed in Rust for simplicity. Each
//! collection replace runs in one transaction, so readers sharing the
//! connection see either the old or the new rows.

use super::{
    rank_entries, validate_entries, CollectionInfo, IndexEntry, SearchResult, SimilarityMetric, VectorIndex,
};
use crate::document::{ApprovalState, Document, DocumentKey, DocumentStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        document_key TEXT PRIMARY KEY,
        chunk_count INTEGER NOT NULL,
        dimensions INTEGER NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entries (
        document_key TEXT NOT NULL,
        chunk_id TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (document_key, chunk_id)
    );

    CREATE INDEX IF NOT EXISTS idx_entries_document_key ON entries(document_key, ordinal);

    CREATE TABLE IF NOT EXISTS documents (
        document_key TEXT PRIMARY KEY,
        id TEXT NOT NULL,
        title TEXT NOT NULL,
        transcript TEXT NOT NULL,
        approval TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

const ENTRY_COLUMNS: &str =
    "document_key, chunk_id, ordinal, start_offset, end_offset, content, embedding";

const DOCUMENT_COLUMNS: &str =
    "document_key, id, title, transcript, approval, created_at, updated_at";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    metric: SimilarityMetric,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, metric: SimilarityMetric) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets other processes read while we write
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?} ({})", path, metric);

        Ok(Self {
            conn: Mutex::new(conn),
            metric,
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(metric: SimilarityMetric) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            metric,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SvarError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn key_from_row(row: &Row<'_>, index: usize) -> rusqlite::Result<DocumentKey> {
        let key: String = row.get(index)?;
        DocumentKey::new(key).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
        let embedding_bytes: Vec<u8> = row.get(6)?;

        Ok(IndexEntry {
            document_key: Self::key_from_row(row, 0)?,
            chunk_id: row.get(1)?,
            ordinal: row.get::<_, i64>(2)? as usize,
            start_offset: row.get::<_, i64>(3)? as usize,
            end_offset: row.get::<_, i64>(4)? as usize,
            content: row.get(5)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
        })
    }

    fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id: String = row.get(1)?;
        let approval: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Document {
            key: Self::key_from_row(row, 0)?,
            id: uuid::Uuid::parse_str(&id).unwrap_or_default(),
            title: row.get(2)?,
            transcript: row.get(3)?,
            approval: approval.parse().unwrap_or(ApprovalState::Draft),
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn load_entries(conn: &Connection, document_key: &DocumentKey) -> Result<Vec<IndexEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE document_key = ?1 ORDER BY ordinal",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![document_key.as_str()], Self::entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn replace_collection(&self, document_key: &DocumentKey, entries: &[IndexEntry], dimensions: usize) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM entries WHERE document_key = ?1", params![document_key.as_str()])?;

        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                ENTRY_COLUMNS
            ))?;

            for entry in entries {
                insert.execute(params![
                    entry.document_key.as_str(),
                    entry.chunk_id,
                    entry.ordinal as i64,
                    entry.start_offset as i64,
                    entry.end_offset as i64,
                    entry.content,
                    Self::embedding_to_bytes(&entry.embedding),
                ])?;
            }
        }

        tx.execute(
            r#"
            INSERT OR REPLACE INTO collections (document_key, chunk_count, dimensions, indexed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                document_key.as_str(),
                entries.len() as i64,
                dimensions as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorStore {
    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert_collection(&self, document_key: &DocumentKey, entries: Vec<IndexEntry>) -> Result<usize> {
        let dimensions = validate_entries(document_key, &entries)?;

        self.replace_collection(document_key, &entries, dimensions)
            .map_err(SvarError::into_ingestion)?;

        info!("Replaced collection {} with {} entries", document_key, entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(
        &self,
        document_key: &DocumentKey,
        query_embedding: &[f32],
        pool_size: usize,
    ) -> Result<Vec<SearchResult>> {
        let entries = {
            let conn = self.lock()?;
            Self::load_entries(&conn, document_key)?
        };

        let results = rank_entries(&entries, self.metric, query_embedding, pool_size)?;
        debug!("Found {} candidates in {}", results.len(), document_key);
        Ok(results)
    }

    async fn has_collection(&self, document_key: &DocumentKey) -> Result<bool> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE document_key = ?1",
            params![document_key.as_str()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    async fn get_collection(&self, document_key: &DocumentKey) -> Result<Vec<IndexEntry>> {
        let conn = self.lock()?;
        Self::load_entries(&conn, document_key)
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, document_key: &DocumentKey) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let deleted = tx.execute("DELETE FROM entries WHERE document_key = ?1", params![document_key.as_str()])?;
        tx.execute("DELETE FROM collections WHERE document_key = ?1", params![document_key.as_str()])?;
        tx.commit()?;

        info!("Deleted {} entries for {}", deleted, document_key);
        Ok(deleted)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT document_key, chunk_count, dimensions, indexed_at
            FROM collections
            ORDER BY indexed_at DESC, document_key
            "#,
        )?;

        let collections = stmt
            .query_map([], |row| {
                let indexed_at: String = row.get(3)?;
                Ok(CollectionInfo {
                    document_key: Self::key_from_row(row, 0)?,
                    chunk_count: row.get::<_, i64>(1)? as usize,
                    dimensions: row.get::<_, i64>(2)? as usize,
                    indexed_at: Self::parse_timestamp(&indexed_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(collections)
    }
}

#[async_trait]
impl DocumentStore for SqliteVectorStore {
    async fn save_document(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                DOCUMENT_COLUMNS
            ),
            params![
                doc.key.as_str(),
                doc.id.to_string(),
                doc.title,
                doc.transcript,
                doc.approval.to_string(),
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )?;

        debug!("Saved document {}", doc.key);
        Ok(())
    }

    async fn get_document(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let conn = self.lock()?;

        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE document_key = ?1", DOCUMENT_COLUMNS),
                params![key.as_str()],
                Self::document_from_row,
            )
            .optional()?;

        Ok(doc)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents ORDER BY updated_at DESC, document_key",
            DOCUMENT_COLUMNS
        ))?;

        let docs = stmt
            .query_map([], Self::document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(docs)
    }

    async fn delete_document(&self, key: &DocumentKey) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM documents WHERE document_key = ?1", params![key.as_str()])?;
        Ok(deleted > 0)
    }
}
