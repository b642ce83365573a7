//! Vector index abstraction for Svar.
//!
//! Entries are grouped into one collection per document key. A collection is
//! always replaced as a whole, and queries never cross collection boundaries.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::ContentChunk;
use crate::document::DocumentKey;
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::ops::Range;

/// A chunk embedding stored in the index together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Key of the document this chunk belongs to.
    pub document_key: DocumentKey,
    /// Chunk ID, unique within the document.
    pub chunk_id: String,
    /// Position of the chunk in the transcript.
    pub ordinal: usize,
    /// Character offset where the chunk starts.
    pub start_offset: usize,
    /// Character offset where the chunk ends (exclusive).
    pub end_offset: usize,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn new(document_key: &DocumentKey, chunk: ContentChunk, embedding: Vec<f32>) -> Self {
        Self {
            document_key: document_key.clone(),
            chunk_id: format!("{}_{}", document_key, chunk.ordinal),
            ordinal: chunk.ordinal,
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
            content: chunk.content,
            embedding,
        }
    }

    /// Character offset range into the source transcript.
    pub fn offsets(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }
}

/// A ranked query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matched entry.
    pub entry: IndexEntry,
    /// Similarity to the query (higher is better).
    pub score: f32,
    /// Zero-based position in the similarity ranking.
    pub rank: usize,
}

/// Summary information about an indexed collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub document_key: DocumentKey,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Embedding dimensions (0 for an empty collection).
    pub dimensions: usize,
    /// When the collection was last replaced.
    pub indexed_at: DateTime<Utc>,
}

/// Similarity metric used to rank entries. Fixed when the index is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    InnerProduct,
}

impl SimilarityMetric {
    /// Similarity between two vectors under this metric.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::InnerProduct => inner_product(a, b),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(SimilarityMetric::Cosine),
            "inner_product" | "dot" | "ip" => Ok(SimilarityMetric::InnerProduct),
            _ => Err(format!("Unknown similarity metric: {}", s)),
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Cosine => write!(f, "cosine"),
            SimilarityMetric::InnerProduct => write!(f, "inner_product"),
        }
    }
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The metric queries are ranked by.
    fn metric(&self) -> SimilarityMetric;

    /// Replace the whole collection for `document_key`.
    ///
    /// Readers observe either the previous or the new collection, never a mix.
    /// On failure the previous collection is left intact.
    async fn upsert_collection(&self, document_key: &DocumentKey, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Up to `pool_size` entries of one collection, most similar first.
    ///
    /// Returns an empty list when the collection does not exist.
    async fn query(
        &self,
        document_key: &DocumentKey,
        query_embedding: &[f32],
        pool_size: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Whether a collection (possibly empty) exists for the key.
    async fn has_collection(&self, document_key: &DocumentKey) -> Result<bool>;

    /// All entries of a collection in ordinal order.
    async fn get_collection(&self, document_key: &DocumentKey) -> Result<Vec<IndexEntry>>;

    /// Drop a collection. Returns the number of removed entries.
    async fn delete_collection(&self, document_key: &DocumentKey) -> Result<usize>;

    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Compute the inner (dot) product of two vectors.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Check a batch before it replaces a collection.
pub(crate) fn validate_entries(document_key: &DocumentKey, entries: &[IndexEntry]) -> Result<usize> {
    let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
    let mut seen_ids = HashSet::with_capacity(entries.len());

    for entry in entries {
        if &entry.document_key != document_key {
            return Err(SvarError::Ingestion(format!(
                "Entry {} belongs to '{}', not '{}'",
                entry.chunk_id, entry.document_key, document_key
            )));
        }
        if entry.embedding.is_empty() || entry.embedding.len() != dimensions {
            return Err(SvarError::Ingestion(format!(
                "Entry {} has {} dimensions, expected {}",
                entry.chunk_id,
                entry.embedding.len(),
                dimensions
            )));
        }
        if entry.start_offset >= entry.end_offset {
            return Err(SvarError::Ingestion(format!("Entry {} has an empty offset range", entry.chunk_id)));
        }
        if !seen_ids.insert(entry.chunk_id.as_str()) {
            return Err(SvarError::Ingestion(format!("Duplicate chunk id {}", entry.chunk_id)));
        }
    }

    Ok(dimensions)
}

/// Order hits by score descending, then ordinal ascending.
///
/// `0.0` and `-0.0` are equal scores.
pub(crate) fn compare_hits(a_score: f32, a_ordinal: usize, b_score: f32, b_ordinal: usize) -> Ordering {
    unsigned_zero(b_score)
        .total_cmp(&unsigned_zero(a_score))
        .then_with(|| a_ordinal.cmp(&b_ordinal))
}

fn unsigned_zero(score: f32) -> f32 {
    if score == 0.0 {
        0.0
    } else {
        score
    }
}

/// Score and rank a collection against a query.
pub(crate) fn rank_entries<'a, I>(
    entries: I,
    metric: SimilarityMetric,
    query_embedding: &[f32],
    pool_size: usize,
) -> Result<Vec<SearchResult>>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut scored: Vec<(&IndexEntry, f32)> = Vec::new();

    for entry in entries {
        if entry.embedding.len() != query_embedding.len() {
            return Err(SvarError::InvalidInput(format!(
                "Query has {} dimensions but collection '{}' has {}",
                query_embedding.len(),
                entry.document_key,
                entry.embedding.len()
            )));
        }
        let score = metric.similarity(query_embedding, &entry.embedding);
        // NaN scores would break the total order
        let score = if score.is_nan() { f32::NEG_INFINITY } else { unsigned_zero(score) };
        scored.push((entry, score));
    }

    scored.sort_by(|a, b| compare_hits(a.1, a.0.ordinal, b.1, b.0.ordinal));
    scored.truncate(pool_size);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(rank, (entry, score))| SearchResult {
            entry: entry.clone(),
            score,
            rank,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::new("video").unwrap()
    }

    fn entry(ordinal: usize, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry::new(
            &key(),
            ContentChunk {
                ordinal,
                content: format!("chunk {ordinal}"),
                start_offset: ordinal * 10,
                end_offset: ordinal * 10 + 10,
            },
            embedding,
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_inner_product_keeps_magnitude() {
        let a = vec![2.0, 0.0];
        let b = vec![3.0, 1.0];
        assert!((inner_product(&a, &b) - 6.0).abs() < 0.001);
        assert!((SimilarityMetric::Cosine.similarity(&a, &b) - 0.9487).abs() < 0.001);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("cosine".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert_eq!("dot".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::InnerProduct);
        assert!("euclidean".parse::<SimilarityMetric>().is_err());
    }

    #[test]
    fn test_chunk_id_follows_key_and_ordinal() {
        assert_eq!(entry(3, vec![1.0]).chunk_id, "video_3");
    }

    #[test]
    fn test_ranking_breaks_ties_by_ordinal() {
        let entries = vec![
            entry(2, vec![1.0, 0.0]),
            entry(0, vec![0.0, 1.0]),
            entry(1, vec![1.0, 0.0]),
        ];

        let results = rank_entries(&entries, SimilarityMetric::Cosine, &[1.0, 0.0], 10).unwrap();
        let ordinals: Vec<usize> = results.iter().map(|r| r.entry.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 0]);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_signed_zero_scores_tie() {
        let entries = vec![entry(1, vec![0.0]), entry(0, vec![-0.0])];

        let results = rank_entries(&entries, SimilarityMetric::InnerProduct, &[1.0], 10).unwrap();
        let ordinals: Vec<usize> = results.iter().map(|r| r.entry.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert!(results.iter().all(|r| r.score.is_sign_positive()));

        assert_eq!(compare_hits(-0.0, 0, 0.0, 1), Ordering::Less);
        assert_eq!(compare_hits(0.0, 0, -0.0, 1), Ordering::Less);
    }

    #[test]
    fn test_ranking_truncates_to_pool_size() {
        let entries: Vec<_> = (0..5).map(|i| entry(i, vec![1.0, i as f32])).collect();
        let results = rank_entries(&entries, SimilarityMetric::InnerProduct, &[0.0, 1.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.ordinal, 4);
        assert_eq!(results[1].entry.ordinal, 3);
    }

    #[test]
    fn test_ranking_rejects_dimension_mismatch() {
        let entries = vec![entry(0, vec![1.0, 0.0])];
        let result = rank_entries(&entries, SimilarityMetric::Cosine, &[1.0, 0.0, 0.0], 1);
        assert!(matches!(result, Err(SvarError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_entries() {
        let good = vec![entry(0, vec![1.0, 0.0]), entry(1, vec![0.0, 1.0])];
        assert_eq!(validate_entries(&key(), &good).unwrap(), 2);
        assert_eq!(validate_entries(&key(), &[]).unwrap(), 0);

        let ragged = vec![entry(0, vec![1.0, 0.0]), entry(1, vec![0.0])];
        assert!(matches!(validate_entries(&key(), &ragged), Err(SvarError::Ingestion(_))));

        let duplicate = vec![entry(0, vec![1.0]), entry(0, vec![1.0])];
        assert!(matches!(validate_entries(&key(), &duplicate), Err(SvarError::Ingestion(_))));

        let other = DocumentKey::new("other").unwrap();
        assert!(matches!(validate_entries(&other, &good), Err(SvarError::Ingestion(_))));
    }
}
