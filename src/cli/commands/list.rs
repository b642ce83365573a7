//! List command implementation.

use super::open;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = open(Operation::Manage, settings)?;

    match orchestrator.list().await {
        Ok(documents) => {
            if documents.is_empty() {
                Output::info("Nothing indexed yet. Use 'svar ingest <key> <file>' to add a transcript.");
            } else {
                Output::header(&format!("Documents ({})", documents.len()));
                println!();

                for doc in &documents {
                    Output::document_info(&doc.title, doc.document_key.as_str(), doc.approval, doc.chunk_count);
                }

                let total_chunks: usize = documents.iter().filter_map(|d| d.chunk_count).sum();
                println!();
                Output::kv("Total documents", &documents.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
