//! In-memory vector store implementation.
//!
//! Each collection lives behind an `Arc` that is swapped on upsert, so readers
//! hold the lock only long enough to clone a pointer.

use super::{
    rank_entries, validate_entries, CollectionInfo, IndexEntry, SearchResult, SimilarityMetric, VectorIndex,
};
use crate::document::{Document, DocumentKey, DocumentStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument};

#[derive(Debug)]
struct Collection {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    indexed_at: DateTime<Utc>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    metric: SimilarityMetric,
    collections: RwLock<HashMap<DocumentKey, Arc<Collection>>>,
    documents: RwLock<HashMap<DocumentKey, Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store ranking by cosine similarity.
    pub fn new() -> Self {
        Self::with_metric(SimilarityMetric::Cosine)
    }

    /// Create a new in-memory vector store with the given metric.
    pub fn with_metric(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            collections: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn collections(&self) -> Result<RwLockReadGuard<'_, HashMap<DocumentKey, Arc<Collection>>>> {
        self.collections
            .read()
            .map_err(|e| SvarError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn collections_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<DocumentKey, Arc<Collection>>>> {
        self.collections
            .write()
            .map_err(|e| SvarError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn documents(&self) -> Result<RwLockReadGuard<'_, HashMap<DocumentKey, Document>>> {
        self.documents
            .read()
            .map_err(|e| SvarError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn documents_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<DocumentKey, Document>>> {
        self.documents
            .write()
            .map_err(|e| SvarError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn snapshot(&self, document_key: &DocumentKey) -> Result<Option<Arc<Collection>>> {
        Ok(self.collections()?.get(document_key).cloned())
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorStore {
    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert_collection(&self, document_key: &DocumentKey, entries: Vec<IndexEntry>) -> Result<usize> {
        let dimensions = validate_entries(document_key, &entries)?;
        let count = entries.len();

        let collection = Arc::new(Collection {
            entries,
            dimensions,
            indexed_at: Utc::now(),
        });

        self.collections_mut()
            .map_err(SvarError::into_ingestion)?
            .insert(document_key.clone(), collection);

        debug!("Replaced collection {} with {} entries", document_key, count);
        Ok(count)
    }

    async fn query(
        &self,
        document_key: &DocumentKey,
        query_embedding: &[f32],
        pool_size: usize,
    ) -> Result<Vec<SearchResult>> {
        match self.snapshot(document_key)? {
            Some(collection) => rank_entries(&collection.entries, self.metric, query_embedding, pool_size),
            None => Ok(Vec::new()),
        }
    }

    async fn has_collection(&self, document_key: &DocumentKey) -> Result<bool> {
        Ok(self.collections()?.contains_key(document_key))
    }

    async fn get_collection(&self, document_key: &DocumentKey) -> Result<Vec<IndexEntry>> {
        let mut entries = self
            .snapshot(document_key)?
            .map(|c| c.entries.clone())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.ordinal);
        Ok(entries)
    }

    async fn delete_collection(&self, document_key: &DocumentKey) -> Result<usize> {
        let removed = self.collections_mut()?.remove(document_key);
        Ok(removed.map(|c| c.entries.len()).unwrap_or(0))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections()?;

        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .map(|(key, collection)| CollectionInfo {
                document_key: key.clone(),
                chunk_count: collection.entries.len(),
                dimensions: collection.dimensions,
                indexed_at: collection.indexed_at,
            })
            .collect();

        infos.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.document_key.cmp(&b.document_key)));
        Ok(infos)
    }
}

#[async_trait]
impl DocumentStore for MemoryVectorStore {
    async fn save_document(&self, doc: &Document) -> Result<()> {
        self.documents_mut()?.insert(doc.key.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, key: &DocumentKey) -> Result<Option<Document>> {
        Ok(self.documents()?.get(key).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.documents()?.values().cloned().collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.key.cmp(&b.key)));
        Ok(docs)
    }

    async fn delete_document(&self, key: &DocumentKey) -> Result<bool> {
        Ok(self.documents_mut()?.remove(key).is_some())
    }
}
