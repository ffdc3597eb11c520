//! CLI runner - executes commands

use crate::auth::Credentials;
use crate::cli::commands::{BrowseCommand, Cli, Commands, OutputFormat};
use crate::config::{ConfigFile, FetcherConfig};
use crate::error::{Error, FetchError, Result};
use crate::fetcher::{PageSnapshot, PaginatedFetcher};
use crate::http::HttpTransport;
use crate::types::{JsonValue, PageKey};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Get { pages } => self.get(pages).await,
            Commands::Browse { start } => self.browse(*start).await,
        }
    }

    /// Load configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<FetcherConfig> {
        let mut raw = match &self.cli.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::from_env()?,
        };

        if let Some(ref base_url) = self.cli.base_url {
            raw.base_url = Some(base_url.clone());
        }
        if let Some(ref token) = self.cli.token {
            raw.auth = Credentials::bearer(token.clone());
        }
        if let Some(ref page_param) = self.cli.page_param {
            raw.page_param = Some(page_param.clone());
        }

        let config = raw.validate()?;
        debug!("Loaded configuration for {}", config.base_url);
        Ok(config)
    }

    /// Visit each page in order through a single fetcher
    async fn get(&self, pages: &[u32]) -> Result<()> {
        let config = self.load_config()?;
        let transport =
            HttpTransport::with_config(config.transport_config(), config.credentials.clone())?;
        let fetcher: PaginatedFetcher<JsonValue> =
            PaginatedFetcher::new(Arc::new(transport), config.endpoint())?;

        let mut last_failure = None;
        let mut failures = 0;
        for &page in pages {
            fetcher.set_page(page);
            let snapshot = fetcher.settled().await;
            self.emit(&snapshot)?;

            if let Some(err) = snapshot.error {
                failures += 1;
                last_failure = Some((page, err));
            }
        }

        info!("Done: {}", fetcher.stats());

        match last_failure {
            Some((page, source)) if failures == 1 => Err(Error::Fetch { page, source }),
            Some(_) => Err(Error::Other(format!(
                "{failures} of {} page(s) failed",
                pages.len()
            ))),
            None => Ok(()),
        }
    }

    /// Navigate pages from stdin until EOF or `quit`
    async fn browse(&self, start: Option<u32>) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(start) = start {
            config.start_page = PageKey::new(start);
        }

        let fetcher: PaginatedFetcher<JsonValue> = PaginatedFetcher::from_config(&config)?;
        self.emit(&fetcher.settled().await)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let command = match line.parse::<BrowseCommand>() {
                Ok(command) => command,
                Err(message) => {
                    eprintln!("{message}");
                    continue;
                }
            };

            match command {
                BrowseCommand::Page(page) => fetcher.set_page(page),
                BrowseCommand::Next => fetcher.set_page_with(PageKey::next),
                BrowseCommand::Prev => fetcher.set_page_with(PageKey::prev),
                BrowseCommand::Show => {}
                BrowseCommand::Quit => break,
            }
            self.emit(&fetcher.settled().await)?;
        }

        fetcher.teardown();
        Ok(())
    }

    /// Print a settled snapshot
    fn emit(&self, snapshot: &PageSnapshot<JsonValue>) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", snapshot_json(snapshot)),
            OutputFormat::Pretty => {
                println!("── Page {} ──", snapshot.page);
                match (&snapshot.data, &snapshot.error) {
                    (_, Some(err)) => println!("Error: {err}"),
                    (Some(data), None) => println!("{}", serde_json::to_string_pretty(&**data)?),
                    (None, None) => println!("(no data)"),
                }
            }
        }
        Ok(())
    }
}

/// One-line JSON rendering of a snapshot
pub fn snapshot_json(snapshot: &PageSnapshot<JsonValue>) -> JsonValue {
    json!({
        "page": snapshot.page,
        "data": snapshot.data.as_deref(),
        "is_fetching": snapshot.is_fetching,
        "error": snapshot.error.as_ref().map(ToString::to_string),
        "status": snapshot.error.as_ref().and_then(FetchError::status),
    })
}
