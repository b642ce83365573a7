//! CLI module for Svar.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Svar - grounded answers from video transcripts
///
/// Index a transcript per video, then ask questions answered only from the
/// most relevant, non-redundant parts of that transcript.
#[derive(Parser, Debug)]
#[command(name = "svar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SVAR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the `[retrieval]` settings section.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RetrievalArgs {
    /// Number of chunks to select
    #[arg(short, long = "top-k")]
    pub k: Option<usize>,

    /// Candidates fetched before diversification
    #[arg(short, long = "pool-size")]
    pub pool_size: Option<usize>,

    /// Relevance/diversity trade-off (1.0 = pure relevance)
    #[arg(short, long)]
    pub lambda: Option<f32>,

    /// Maximum context length in characters
    #[arg(long = "max-context")]
    pub max_context: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a transcript as a draft and index it
    Ingest {
        /// Document key or video title (whitespace becomes '_')
        key: String,

        /// Transcript text file ('-' for stdin)
        file: PathBuf,

        /// Video title (defaults to the key as given)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Approve drafts and re-index them
    Approve {
        /// Document keys to approve
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Ask a question about one video
    Ask {
        /// Document key
        key: String,

        /// The question to ask
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Print the answer and sources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the chunks retrieval would pick, without generating an answer
    Search {
        /// Document key
        key: String,

        /// Search query
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Start an interactive chat session about one video
    Chat {
        /// Document key
        key: String,
    },

    /// List documents and indexed collections
    List,

    /// Delete a document and its collection
    Delete {
        /// Document key
        key: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
