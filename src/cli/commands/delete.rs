//! Delete command implementation.

use super::{open, parse_key};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(key: &str, settings: Settings) -> Result<()> {
    let document_key = parse_key(key)?;
    let orchestrator = open(Operation::Manage, settings)?;

    match orchestrator.delete(&document_key).await {
        Ok(deleted) => {
            Output::success(&format!("Deleted '{}'", document_key));
            Output::kv("Chunks removed", &deleted.chunks_removed.to_string());
            if !deleted.document_removed {
                Output::kv("Note", "no stored transcript, only the index was removed");
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to delete '{}': {}", document_key, e));
            return Err(e.into());
        }
    }

    Ok(())
}
