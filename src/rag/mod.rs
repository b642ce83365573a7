//! RAG (Retrieval-Augmented Generation) over a single video's transcript.
//!
//! The query path is a fixed pipeline: the [`MmrRetriever`] pulls a candidate
//! pool from the vector index and diversifies it, the [`ContextAssembler`]
//! packs the selection into a bounded text block, and the [`RagEngine`] hands
//! that block to the generator.

pub mod context;
mod mmr;
mod response;

pub use context::{AssembledContext, ContextAssembler};
pub use mmr::{select_mmr, MmrRetriever};
pub use response::{ChatSession, ChatTurn, Grounding, RagEngine, RagResponse};

use crate::document::DocumentKey;
use crate::error::{Result, SvarError};
use crate::vector_store::IndexEntry;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Parameters for one retrieval call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    /// Number of chunks to select.
    pub k: usize,
    /// Candidates fetched from the index before diversification.
    pub pool_size: usize,
    /// Relevance/diversity trade-off in `[0, 1]`.
    pub lambda: f32,
    /// Maximum context length in characters.
    pub max_context_length: usize,
}

impl RetrievalConfig {
    /// Create a validated configuration.
    pub fn new(k: usize, pool_size: usize, lambda: f32, max_context_length: usize) -> Result<Self> {
        let config = Self {
            k,
            pool_size,
            lambda,
            max_context_length,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters that cannot produce a meaningful retrieval.
    ///
    /// `k > pool_size` is allowed; it is clamped during selection.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(SvarError::Config("k must be positive".to_string()));
        }
        if self.pool_size == 0 {
            return Err(SvarError::Config("pool_size must be positive".to_string()));
        }
        if !self.lambda.is_finite() || !(0.0..=1.0).contains(&self.lambda) {
            return Err(SvarError::Config(format!(
                "lambda must be between 0 and 1, got {}",
                self.lambda
            )));
        }
        if self.max_context_length == 0 {
            return Err(SvarError::Config("max_context_length must be positive".to_string()));
        }
        Ok(())
    }

    /// Number of chunks selection can return.
    pub fn effective_k(&self) -> usize {
        self.k.min(self.pool_size)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            pool_size: 20,
            lambda: 0.5,
            max_context_length: 12_000,
        }
    }
}

/// A chunk chosen by MMR selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub entry: IndexEntry,
    /// Similarity to the query.
    pub relevance: f32,
    /// Marginal relevance at the moment the chunk was selected.
    pub mmr_score: f32,
    /// Position in the plain similarity ranking.
    pub similarity_rank: usize,
}

/// Chunks selected for one query, in selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub document_key: DocumentKey,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Chunk ids in selection order.
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.entry.chunk_id.as_str()).collect()
    }
}

/// A transcript span an answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: String,
    pub ordinal: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub relevance: f32,
}

impl Source {
    pub fn offsets(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }
}

impl From<&RetrievedChunk> for Source {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            chunk_id: chunk.entry.chunk_id.clone(),
            ordinal: chunk.entry.ordinal,
            start_offset: chunk.entry.start_offset,
            end_offset: chunk.entry.end_offset,
            relevance: chunk.relevance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(RetrievalConfig::new(3, 10, 0.7, 1000).is_ok());
        assert!(RetrievalConfig::new(0, 10, 0.5, 1000).is_err());
        assert!(RetrievalConfig::new(3, 0, 0.5, 1000).is_err());
        assert!(RetrievalConfig::new(3, 10, -0.1, 1000).is_err());
        assert!(RetrievalConfig::new(3, 10, f32::NAN, 1000).is_err());
        assert!(RetrievalConfig::new(3, 10, 0.5, 0).is_err());
    }

    #[test]
    fn test_k_larger_than_pool_is_clamped_not_rejected() {
        let config = RetrievalConfig::new(50, 10, 0.5, 1000).unwrap();
        assert_eq!(config.effective_k(), 10);
    }
}
