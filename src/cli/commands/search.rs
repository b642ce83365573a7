//! Search command implementation.

use super::{open, parse_key, retrieval_config};
use crate::cli::preflight::Operation;
use crate::cli::{Output, RetrievalArgs};
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(key: &str, query: &str, retrieval: &RetrievalArgs, settings: Settings) -> Result<()> {
    let document_key = parse_key(key)?;
    let config = retrieval_config(&settings, retrieval)?;
    let orchestrator = open(Operation::Search, settings)?;

    let spinner = Output::spinner("Searching...");
    let result = orchestrator.retrieve(&document_key, query, Some(config)).await;
    spinner.finish_and_clear();

    match result {
        Ok(retrieval) => {
            if retrieval.is_empty() {
                Output::warning("No chunks indexed for this key.");
            } else {
                Output::success(&format!(
                    "Selected {} chunks (k={}, pool={}, lambda={})",
                    retrieval.len(),
                    config.k,
                    config.pool_size,
                    config.lambda
                ));
                for (i, chunk) in retrieval.chunks.iter().enumerate() {
                    Output::retrieved_chunk(i + 1, chunk);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
