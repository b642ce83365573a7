//! CLI output formatting utilities.

use crate::document::ApprovalState;
use crate::rag::{RetrievedChunk, Source};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one row of the document listing.
    pub fn document_info(title: &str, key: &str, approval: Option<ApprovalState>, chunks: Option<usize>) {
        let state = match approval {
            Some(ApprovalState::Approved) => style("approved").green().to_string(),
            Some(ApprovalState::Draft) => style("draft").yellow().to_string(),
            None => style("index only").dim().to_string(),
        };
        let chunks = chunks.map_or_else(|| "not indexed".to_string(), |n| format!("{} chunks", n));
        println!(
            "  {} {} ({}, {}, {})",
            style("*").cyan(),
            style(title).bold(),
            style(key).dim(),
            state,
            chunks
        );
    }

    /// Print a chunk picked by retrieval.
    pub fn retrieved_chunk(position: usize, chunk: &RetrievedChunk) {
        println!(
            "\n{} [{}] {} chars {}-{} (similarity: {:.2}, rank {}, mmr: {:.2})",
            style(">>").green(),
            position,
            style(&chunk.entry.chunk_id).bold(),
            chunk.entry.start_offset,
            chunk.entry.end_offset,
            chunk.relevance,
            chunk.similarity_rank + 1,
            chunk.mmr_score
        );
        println!("   {}", content_preview(&chunk.entry.content, 200));
    }

    /// Print a source an answer was grounded on.
    pub fn source(source: &Source) {
        println!(
            "  {} {} chars {}-{} (score: {:.2})",
            style("*").cyan(),
            style(&source.chunk_id).bold(),
            source.start_offset,
            source.end_offset,
            source.relevance
        );
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(bar_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Collapse newlines and truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content,
    }
}
