//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "paperrag",
    version,
    about = "Question answering over arXiv papers",
    long_about = "paperrag downloads arXiv papers matching a search query, indexes their text \
                  in a vector store and answers questions grounded in the retrieved passages."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/paperrag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search arXiv and download the matching PDFs
    Download {
        /// Search query, passed to arXiv as-is (e.g. "ti:transformer AND cat:cs.CL")
        query: String,

        /// Maximum number of papers to download (1-100)
        #[arg(short = 'n', long, default_value = "5")]
        max_results: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract, chunk and index every downloaded PDF
    Ingest {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question against the indexed papers
    Ask {
        /// Question text
        question: String,

        /// Number of chunks to retrieve (defaults to query.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the global config path)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
