//! Maximum Marginal Relevance selection.
//!
//! Each step picks the candidate maximizing
//! `λ·sim(c, q) − (1 − λ)·max(sim(c, s) for s in selected)`,
//! breaking ties by similarity rank and then by chunk ordinal.

use super::{RetrievalConfig, RetrievalResult, RetrievedChunk};
use crate::document::DocumentKey;
use crate::embedding::Embedder;
use crate::error::{Result, SvarError};
use crate::generation::with_timeout;
use crate::vector_store::{SearchResult, SimilarityMetric, VectorIndex};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Select up to `k` candidates from a similarity-ranked pool.
///
/// `pool` must come from one index query, so `score` is the similarity to
/// the query and `rank` its position. The result is in selection order.
pub fn select_mmr(pool: Vec<SearchResult>, metric: SimilarityMetric, k: usize, lambda: f32) -> Vec<RetrievedChunk> {
    let k = k.min(pool.len());
    let mut remaining = pool;
    // Highest similarity of each remaining candidate to anything selected so far
    let mut redundancy = vec![f32::NEG_INFINITY; remaining.len()];
    let mut selected: Vec<RetrievedChunk> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let marginal = |i: usize| -> f32 {
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * remaining[i].score - (1.0 - lambda) * penalty;
            if score.is_nan() {
                f32::NEG_INFINITY
            } else {
                score
            }
        };

        let mut best = 0;
        let mut best_score = marginal(0);
        for i in 1..remaining.len() {
            let score = marginal(i);
            if prefer(score, &remaining[i], best_score, &remaining[best]) {
                best = i;
                best_score = score;
            }
        }

        let chosen = remaining.swap_remove(best);
        redundancy.swap_remove(best);

        for (candidate, max_sim) in remaining.iter().zip(redundancy.iter_mut()) {
            let sim = metric.similarity(&candidate.entry.embedding, &chosen.entry.embedding);
            if sim > *max_sim {
                *max_sim = sim;
            }
        }

        selected.push(RetrievedChunk {
            relevance: chosen.score,
            mmr_score: best_score,
            similarity_rank: chosen.rank,
            entry: chosen.entry,
        });
    }

    selected
}

/// Whether candidate `a` with marginal score `a_score` beats the current best `b`.
fn prefer(a_score: f32, a: &SearchResult, b_score: f32, b: &SearchResult) -> bool {
    // Scores are never NaN here, and +0.0 and -0.0 must tie
    match a_score.partial_cmp(&b_score).unwrap_or(Ordering::Equal) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => (a.rank, a.entry.ordinal) < (b.rank, b.entry.ordinal),
    }
}

/// Retrieves a diverse, relevant subset of one document's chunks.
#[derive(Clone)]
pub struct MmrRetriever {
    vector_store: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
}

impl MmrRetriever {
    /// Create a new retriever.
    pub fn new(vector_store: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            embed_timeout: Duration::from_secs(60),
        }
    }

    /// Set the timeout for embedding the query.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Embed `query` and select chunks from the collection of `document_key`.
    ///
    /// Fails with [`SvarError::NotFound`] when nothing was ever indexed for the
    /// key. An existing but empty collection yields an empty result.
    #[instrument(skip(self, query, config), fields(document_key = %document_key))]
    pub async fn retrieve(
        &self,
        document_key: &DocumentKey,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<RetrievalResult> {
        config.validate()?;
        if query.trim().is_empty() {
            return Err(SvarError::InvalidInput("Query must not be empty".to_string()));
        }
        self.ensure_collection(document_key).await?;

        let query_embedding = with_timeout(self.embed_timeout, self.embedder.embed(query)).await?;
        self.select(document_key, &query_embedding, config).await
    }

    /// Select chunks for an already embedded query.
    pub async fn retrieve_with_vector(
        &self,
        document_key: &DocumentKey,
        query_embedding: &[f32],
        config: &RetrievalConfig,
    ) -> Result<RetrievalResult> {
        config.validate()?;
        self.ensure_collection(document_key).await?;
        self.select(document_key, query_embedding, config).await
    }

    async fn ensure_collection(&self, document_key: &DocumentKey) -> Result<()> {
        if self.vector_store.has_collection(document_key).await? {
            Ok(())
        } else {
            Err(SvarError::NotFound(document_key.to_string()))
        }
    }

    async fn select(
        &self,
        document_key: &DocumentKey,
        query_embedding: &[f32],
        config: &RetrievalConfig,
    ) -> Result<RetrievalResult> {
        let pool = self
            .vector_store
            .query(document_key, query_embedding, config.pool_size)
            .await?;
        let pool_len = pool.len();

        let chunks = select_mmr(pool, self.vector_store.metric(), config.k, config.lambda);
        debug!("Selected {} of {} candidates (lambda {})", chunks.len(), pool_len, config.lambda);

        Ok(RetrievalResult {
            document_key: document_key.clone(),
            chunks,
        })
    }
}
