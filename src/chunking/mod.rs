//! Transcript chunking.
//!
//! Splits a transcript into overlapping, fixed-length windows. Chunking is pure
//! text segmentation: no embedding or network calls happen here.

mod window;

pub use window::{Chunks, TextSplitter};

use crate::error::{Result, SvarError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A chunk of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Position of this chunk in the transcript, starting at 0.
    pub ordinal: usize,
    /// Text content of this chunk.
    pub content: String,
    /// Character offset of the first character (inclusive).
    pub start_offset: usize,
    /// Character offset past the last character (exclusive).
    pub end_offset: usize,
}

impl ContentChunk {
    /// Character offset range into the source text.
    pub fn offsets(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Unit in which chunk size and overlap are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// Whitespace-separated tokens.
    Tokens,
}

impl std::str::FromStr for ChunkUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(ChunkUnit::Chars),
            "tokens" | "words" => Ok(ChunkUnit::Tokens),
            _ => Err(format!("Unknown chunk unit: {}", s)),
        }
    }
}

impl std::fmt::Display for ChunkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkUnit::Chars => write!(f, "chars"),
            ChunkUnit::Tokens => write!(f, "tokens"),
        }
    }
}

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
    unit: ChunkUnit,
}

impl ChunkingConfig {
    /// Create a character-based configuration.
    ///
    /// Both values must be positive and `overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SvarError::Config("chunk_size must be positive".to_string()));
        }
        if overlap == 0 {
            return Err(SvarError::Config("overlap must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(SvarError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
            unit: ChunkUnit::Chars,
        })
    }

    /// Measure sizes in the given unit.
    pub fn with_unit(mut self, unit: ChunkUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn unit(&self) -> ChunkUnit {
        self.unit
    }

    /// Distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 50,
            unit: ChunkUnit::Chars,
        }
    }
}

/// Split `text` into character windows of `chunk_size` overlapping by `overlap`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Chunks<'_>> {
    let config = ChunkingConfig::new(chunk_size, overlap)?;
    Ok(TextSplitter::new(config).split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(ChunkingConfig::new(200, 50).is_ok());
        assert!(matches!(ChunkingConfig::new(0, 0), Err(SvarError::Config(_))));
        assert!(matches!(ChunkingConfig::new(100, 0), Err(SvarError::Config(_))));
        assert!(matches!(ChunkingConfig::new(100, 100), Err(SvarError::Config(_))));
        assert!(matches!(ChunkingConfig::new(100, 150), Err(SvarError::Config(_))));
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("chars".parse::<ChunkUnit>().unwrap(), ChunkUnit::Chars);
        assert_eq!("Tokens".parse::<ChunkUnit>().unwrap(), ChunkUnit::Tokens);
        assert!("sentences".parse::<ChunkUnit>().is_err());
    }

    #[test]
    fn test_split_rejects_bad_overlap_before_touching_text() {
        let err = split("some text", 10, 10).unwrap_err();
        assert!(matches!(err, SvarError::Config(_)));
    }

    #[test]
    fn test_split_scenario_thousand_chars() {
        let text = "a".repeat(1000);
        let chunks: Vec<ContentChunk> = split(&text, 200, 50).unwrap().collect();

        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[0].offsets(), 0..200);
        assert_eq!(chunks[1].offsets(), 150..350);
        assert_eq!(chunks[6].offsets(), 900..1000);
    }
}
