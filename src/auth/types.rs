//! Credential types
//!
//! Credentials are static: they are validated once when configuration is
//! loaded and then attached to every page request unchanged.

use crate::error::{Error, Result};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

fn default_api_key_name() -> String {
    "X-API-Key".to_string()
}

/// Credentials attached to every page request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// No authentication required
    #[default]
    None,

    /// Bearer token authentication
    Bearer {
        /// The bearer token
        token: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        #[serde(default)]
        location: Location,
        /// Header or query parameter name
        #[serde(default = "default_api_key_name")]
        name: String,
        /// The API key value
        value: String,
    },
}

impl Credentials {
    /// Bearer token credentials
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// API key sent in the named header
    pub fn api_key_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            location: Location::Header,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether any credentials are configured
    pub fn is_none(&self) -> bool {
        matches!(self, Credentials::None)
    }

    /// Reject empty credential fields
    pub fn validate(&self) -> Result<()> {
        fn mandatory(field: &str, value: &str) -> Result<()> {
            if value.trim().is_empty() {
                return Err(Error::invalid_value(field, format!("{field} is mandatory")));
            }
            Ok(())
        }

        match self {
            Credentials::None => Ok(()),
            Credentials::Bearer { token } => mandatory("token", token),
            Credentials::Basic { username, password } => {
                mandatory("username", username)?;
                mandatory("password", password)
            }
            Credentials::ApiKey { name, value, .. } => {
                mandatory("name", name)?;
                mandatory("value", value)
            }
        }
    }

    /// Apply the credentials to a request builder
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::None => req,
            Credentials::Bearer { token } => req.bearer_auth(token),
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::ApiKey {
                location,
                name,
                value,
            } => match location {
                Location::Header => req.header(name.as_str(), value.as_str()),
                Location::Query => req.query(&[(name.as_str(), value.as_str())]),
            },
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .field("value", &"***")
                .finish(),
        }
    }
}
