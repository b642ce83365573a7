//! Ingest command implementation.

use super::{open, parse_key};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(key: &str, file: &Path, title: Option<&str>, settings: Settings) -> Result<()> {
    let document_key = parse_key(key)?;
    let title = title.unwrap_or(key);
    let transcript = read_transcript(file)?;

    let orchestrator = open(Operation::Ingest, settings)?;

    let spinner = Output::spinner(&format!("Indexing '{}'...", title));
    let result = orchestrator.ingest_document(&document_key, title, &transcript).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) if result.superseded => {
            Output::warning("A newer ingestion for this key finished first; nothing was written.");
        }
        Ok(result) => {
            Output::success(&format!("Indexed {} chunks for '{}'", result.chunks_indexed, title));
            Output::kv("Key", document_key.as_str());
            Output::kv("State", "draft");
            Output::info(&format!("Run 'svar approve {}' once the transcript is reviewed.", document_key));
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

fn read_transcript(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut transcript = String::new();
        std::io::stdin()
            .read_to_string(&mut transcript)
            .context("Failed to read transcript from stdin")?;
        return Ok(transcript);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read transcript from {}", file.display()))
}
