//! Ask command implementation.

use super::{open, parse_key, retrieval_config};
use crate::cli::preflight::Operation;
use crate::cli::{Output, RetrievalArgs};
use crate::config::Settings;
use crate::error::SvarError;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    key: &str,
    question: &str,
    retrieval: &RetrievalArgs,
    json: bool,
    settings: Settings,
) -> Result<()> {
    let document_key = parse_key(key)?;
    let config = retrieval_config(&settings, retrieval)?;
    let orchestrator = open(Operation::Ask, settings)?;

    let spinner = Output::spinner("Searching transcript...");
    let result = orchestrator
        .answer_query(
            &document_key,
            question,
            config.k,
            config.pool_size,
            config.lambda,
            config.max_context_length,
        )
        .await;
    spinner.finish_and_clear();

    match result {
        Ok(response) if json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Ok(response) => {
            println!("\n{}\n", response.answer);

            if response.is_grounded() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::source(source);
                }
            } else {
                Output::warning("Nothing relevant was found in this transcript.");
            }
        }
        Err(SvarError::NotFound(key)) => {
            Output::error(&format!("Nothing indexed for '{}'. Use 'svar ingest' first.", key));
            anyhow::bail!("no content indexed for '{}'", key);
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
