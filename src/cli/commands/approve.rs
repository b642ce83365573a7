//! Approve command implementation.

use super::{open, parse_key};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use futures::stream::{self, StreamExt};

/// Approvals running at once; each one re-embeds a whole transcript.
const MAX_CONCURRENT_APPROVALS: usize = 4;

/// Run the approve command.
pub async fn run_approve(keys: &[String], settings: Settings) -> Result<()> {
    let document_keys = keys.iter().map(|k| parse_key(k)).collect::<Result<Vec<_>>>()?;
    let orchestrator = open(Operation::Ingest, settings)?;

    let progress = Output::progress_bar(document_keys.len() as u64, "Approving...");
    let orchestrator = &orchestrator;
    let progress_ref = &progress;

    let results: Vec<_> = stream::iter(document_keys)
        .map(|document_key| async move {
            let result = orchestrator.approve(&document_key).await;
            progress_ref.inc(1);
            (document_key, result)
        })
        .buffer_unordered(MAX_CONCURRENT_APPROVALS)
        .collect()
        .await;
    progress.finish_and_clear();

    let mut failures = 0;
    for (document_key, result) in results {
        match result {
            Ok(approved) if approved.newly_approved => Output::success(&format!(
                "Approved '{}' ({} chunks indexed)",
                approved.document.title, approved.ingest.chunks_indexed
            )),
            Ok(approved) => Output::info(&format!(
                "'{}' was already approved; re-indexed {} chunks",
                approved.document.title, approved.ingest.chunks_indexed
            )),
            Err(e) => {
                failures += 1;
                Output::error(&format!("{}: {}", document_key, e));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} approvals failed", failures, keys.len());
    }
    Ok(())
}
