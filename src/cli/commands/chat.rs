//! Interactive chat command.

use super::{open, parse_key};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(key: &str, settings: Settings) -> Result<()> {
    let document_key = parse_key(key)?;
    let orchestrator = open(Operation::Ask, settings)?;

    // Fail early instead of after the first question
    if !orchestrator.index().has_collection(&document_key).await? {
        Output::error(&format!("Nothing indexed for '{}'. Use 'svar ingest' first.", document_key));
        anyhow::bail!("no content indexed for '{}'", document_key);
    }

    let mut session = orchestrator.new_session();

    println!("\n{} {}", style("Svar Chat").bold().cyan(), style(document_key.as_str()).dim());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        let spinner = Output::spinner("Thinking...");
        let result = orchestrator.chat(&mut session, &document_key, input).await;
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                println!("\n{} {}\n", style("Svar:").cyan().bold(), response.answer);
                if !response.is_grounded() {
                    Output::warning("No relevant transcript excerpts for this message.");
                }
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
