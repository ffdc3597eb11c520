//! CLI module
//!
//! Command-line front end for a single fetcher.
//!
//! # Commands
//!
//! - `get` - Visit a list of pages and print each settled snapshot
//! - `browse` - Navigate pages interactively from stdin

mod commands;
mod runner;

pub use commands::{BrowseCommand, Cli, Commands, OutputFormat};
pub use runner::{snapshot_json, Runner};
