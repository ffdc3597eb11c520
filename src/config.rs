//! Fetcher configuration
//!
//! Configuration is validated eagerly: loading either produces a complete
//! [`FetcherConfig`] or fails with the first problem found. Nothing is
//! validated lazily once a fetcher is running.
//!
//! Sources:
//! - YAML or JSON text / files, deserialized into [`ConfigFile`]
//! - Environment variables (`PAGED_FETCH_*`)
//!
//! A `ConfigFile` may be adjusted (e.g. by command-line flags) before it is
//! turned into a `FetcherConfig` with [`ConfigFile::validate`].

use crate::auth::Credentials;
use crate::error::{Error, Result, ResultExt};
use crate::fetcher::{PageEndpoint, DEFAULT_PAGE_PARAM};
use crate::http::{default_user_agent, HttpTransportConfig, RateLimiterConfig};
use crate::types::{PageKey, StringMap};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_BASE_URL: &str = "PAGED_FETCH_BASE_URL";
pub const ENV_PAGE_PARAM: &str = "PAGED_FETCH_PAGE_PARAM";
pub const ENV_START_PAGE: &str = "PAGED_FETCH_START_PAGE";
pub const ENV_TIMEOUT_SECS: &str = "PAGED_FETCH_TIMEOUT_SECS";
pub const ENV_TOKEN: &str = "PAGED_FETCH_TOKEN";
pub const ENV_USERNAME: &str = "PAGED_FETCH_USERNAME";
pub const ENV_PASSWORD: &str = "PAGED_FETCH_PASSWORD";
pub const ENV_API_KEY_HEADER: &str = "PAGED_FETCH_API_KEY_HEADER";
pub const ENV_API_KEY: &str = "PAGED_FETCH_API_KEY";

// ============================================================================
// Raw Config
// ============================================================================

/// Configuration as written, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Base URL of the paginated resource
    #[serde(default)]
    pub base_url: Option<String>,

    /// Query parameter carrying the page number
    #[serde(default)]
    pub page_param: Option<String>,

    /// Page fetched on mount
    #[serde(default)]
    pub start_page: Option<u32>,

    /// Credentials for every request
    #[serde(default)]
    pub auth: Credentials,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpSettings,
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: StringMap,

    /// Optional request pacing
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            headers: StringMap::new(),
            rate_limit: None,
        }
    }
}

impl ConfigFile {
    /// Parse YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a config file; `.json` files are parsed as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        };
        parsed.with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let start_page = var(ENV_START_PAGE)
            .map(|raw| parse_number::<u32>(ENV_START_PAGE, &raw))
            .transpose()?;

        let mut http = HttpSettings::default();
        if let Some(raw) = var(ENV_TIMEOUT_SECS) {
            http.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &raw)?;
        }

        Ok(Self {
            base_url: var(ENV_BASE_URL),
            page_param: var(ENV_PAGE_PARAM),
            start_page,
            auth: credentials_from_vars(&var)?,
            http,
        })
    }

    /// Check every field and produce the runtime configuration
    pub fn validate(self) -> Result<FetcherConfig> {
        let raw_url = self
            .base_url
            .ok_or_else(|| Error::missing_field("base_url"))?;
        let base_url =
            Url::parse(raw_url.trim()).map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "base_url",
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }

        let page_param = self
            .page_param
            .unwrap_or_else(|| DEFAULT_PAGE_PARAM.to_string());
        if page_param.trim().is_empty() {
            return Err(Error::invalid_value("page_param", "must not be empty"));
        }

        let start_page = match self.start_page {
            Some(0) => return Err(Error::invalid_value("start_page", "pages start at 1")),
            Some(page) => PageKey::new(page),
            None => PageKey::FIRST,
        };

        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value(
                "http.timeout_secs",
                "must be greater than zero",
            ));
        }

        if let Some(ref rate_limit) = self.http.rate_limit {
            rate_limit.validate()?;
        }
        self.auth.validate()?;

        Ok(FetcherConfig {
            base_url,
            page_param,
            start_page,
            credentials: self.auth,
            http: self.http,
        })
    }
}

fn parse_number<N: std::str::FromStr>(field: &str, raw: &str) -> Result<N>
where
    N::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: N::Err| Error::invalid_value(field, e.to_string()))
}

/// Pick credentials from whichever variables are set
fn credentials_from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let token = var(ENV_TOKEN);
    let username = var(ENV_USERNAME);
    let password = var(ENV_PASSWORD);
    let api_key = var(ENV_API_KEY);

    let kinds = [
        token.is_some(),
        username.is_some() || password.is_some(),
        api_key.is_some(),
    ];
    if kinds.iter().filter(|set| **set).count() > 1 {
        return Err(Error::config(format!(
            "Only one of {ENV_TOKEN}, {ENV_USERNAME}/{ENV_PASSWORD} or {ENV_API_KEY} may be set"
        )));
    }

    if let Some(token) = token {
        return Ok(Credentials::bearer(token));
    }

    match (username, password) {
        (Some(username), Some(password)) => return Ok(Credentials::basic(username, password)),
        (Some(_), None) => return Err(Error::missing_field(ENV_PASSWORD)),
        (None, Some(_)) => return Err(Error::missing_field(ENV_USERNAME)),
        (None, None) => {}
    }

    if let Some(value) = api_key {
        let header = var(ENV_API_KEY_HEADER).unwrap_or_else(|| "X-API-Key".to_string());
        return Ok(Credentials::api_key_header(header, value));
    }

    Ok(Credentials::None)
}

// ============================================================================
// Validated Config
// ============================================================================

/// Fully validated configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL of the paginated resource
    pub base_url: Url,
    /// Query parameter carrying the page number
    pub page_param: String,
    /// Page fetched on mount
    pub start_page: PageKey,
    /// Credentials for every request
    pub credentials: Credentials,
    /// HTTP transport settings
    pub http: HttpSettings,
}

impl FetcherConfig {
    /// Load and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        ConfigFile::from_yaml_str(yaml)?.validate()
    }

    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigFile::from_file(path)?.validate()
    }

    /// Load and validate the process environment
    pub fn from_env() -> Result<Self> {
        ConfigFile::from_env()?.validate()
    }

    /// Where pages are fetched from
    pub fn endpoint(&self) -> PageEndpoint {
        PageEndpoint::new(self.base_url.clone()).with_page_param(self.page_param.clone())
    }

    /// Settings for the HTTP transport
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            rate_limit: self.http.rate_limit,
            default_headers: self.http.headers.clone(),
            user_agent: self
                .http
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
        }
    }
}
