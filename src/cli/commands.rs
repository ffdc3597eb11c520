//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Fetch pages of a paginated HTTP resource
#[derive(Parser, Debug)]
#[command(name = "paged-fetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON); environment variables are used otherwise
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the paginated resource
    #[arg(short, long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Query parameter carrying the page number
    #[arg(long, global = true)]
    pub page_param: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Visit pages in order; revisits are served from the cache
    Get {
        /// Pages to visit (repeatable)
        #[arg(short, long = "page", required = true, num_args = 1..)]
        pages: Vec<u32>,
    },

    /// Navigate pages interactively (commands on stdin: <n>, next, prev, quit)
    Browse {
        /// Page to start on (defaults to the configured start page)
        #[arg(long)]
        start: Option<u32>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one snapshot per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// One line of input in browse mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseCommand {
    /// Jump to a page
    Page(u32),
    /// Following page
    Next,
    /// Preceding page
    Prev,
    /// Show the current snapshot again
    Show,
    /// Leave browse mode
    Quit,
}

impl FromStr for BrowseCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "n" | "next" => Ok(Self::Next),
            "p" | "prev" => Ok(Self::Prev),
            "" | "s" | "show" => Ok(Self::Show),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => other
                .parse()
                .map(Self::Page)
                .map_err(|_| format!("Unknown command '{input}' (expected <n>, next, prev, show or quit)")),
        }
    }
}
