//! CLI command implementations.

mod approve;
mod ask;
mod chat;
mod config;
mod delete;
mod ingest;
mod list;
mod search;

pub use approve::run_approve;
pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use delete::run_delete;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, RetrievalArgs};
use crate::config::Settings;
use crate::document::DocumentKey;
use crate::orchestrator::Orchestrator;
use crate::rag::RetrievalConfig;
use anyhow::Result;

/// Normalize a key or title given on the command line.
fn parse_key(input: &str) -> Result<DocumentKey> {
    Ok(DocumentKey::from_title(input)?)
}

/// Run pre-flight checks and build the orchestrator.
fn open(operation: Operation, settings: Settings) -> Result<Orchestrator> {
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    Ok(Orchestrator::new(settings)?)
}

/// Configured retrieval parameters with command-line overrides applied.
fn retrieval_config(settings: &Settings, args: &RetrievalArgs) -> Result<RetrievalConfig> {
    let defaults = &settings.retrieval;
    Ok(RetrievalConfig::new(
        args.k.unwrap_or(defaults.k),
        args.pool_size.unwrap_or(defaults.pool_size),
        args.lambda.unwrap_or(defaults.lambda),
        args.max_context.unwrap_or(defaults.max_context_length),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let settings = Settings::default();
        let args = RetrievalArgs {
            k: Some(3),
            lambda: Some(0.9),
            ..RetrievalArgs::default()
        };

        let config = retrieval_config(&settings, &args).unwrap();
        assert_eq!(config.k, 3);
        assert_eq!(config.lambda, 0.9);
        assert_eq!(config.pool_size, settings.retrieval.pool_size);
        assert_eq!(config.max_context_length, settings.retrieval.max_context_length);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = RetrievalArgs {
            lambda: Some(-1.0),
            ..RetrievalArgs::default()
        };
        assert!(retrieval_config(&Settings::default(), &args).is_err());
    }

    #[test]
    fn test_titles_become_keys() {
        assert_eq!(parse_key("Intro to Rust").unwrap().as_str(), "Intro_to_Rust");
        assert_eq!(parse_key("intro_to_rust").unwrap().as_str(), "intro_to_rust");
    }
}
