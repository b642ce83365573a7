//! Svar - grounded question answering over video transcripts
//!
//! The name "Svar" is the Norwegian/Scandinavian word for "answer."
//!
//! # Overview
//!
//! Svar keeps one vector collection per video and answers questions from it:
//! - Split a transcript into overlapping, fixed-length chunks
//! - Embed the chunks and replace the video's collection atomically
//! - Pick a relevant but non-redundant subset with Maximal Marginal Relevance
//! - Pack the picks into a bounded context and hand it to an LLM
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `document` - Document keys, transcripts and approval state
//! - `chunking` - Fixed-window transcript chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Per-document vector collections
//! - `rag` - MMR retrieval, context assembly and answering
//! - `generation` - LLM calls with timeouts and retries
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use svar::config::Settings;
//! use svar::document::DocumentKey;
//! use svar::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let key = DocumentKey::from_title("Intro to Rust")?;
//!     let transcript = std::fs::read_to_string("intro.txt")?;
//!     let result = orchestrator.index_transcript(&key, &transcript, 1000, 50).await?;
//!     println!("Indexed {} chunks", result.chunks_indexed);
//!
//!     let response = orchestrator.answer_query(&key, "What is ownership?", 5, 20, 0.5, 12_000).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, SvarError};
