use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("server address is empty")]
    Empty,
    #[error("server address `{0}` contains whitespace")]
    Whitespace(String),
    #[error("server address `{0}` must not contain a path")]
    Path(String),
}

/// A worker server identified by `host:port`.
///
/// Accepts `http://` / `https://` prefixes and a trailing slash on input so that
/// copy-pasted browser URLs work, but always stores the bare authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress(String);

impl ServerAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let without_scheme = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);
        let authority = without_scheme.trim_end_matches('/');

        if authority.is_empty() {
            return Err(AddressError::Empty);
        }
        if authority.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace(authority.to_string()));
        }
        if authority.contains('/') {
            return Err(AddressError::Path(authority.to_string()));
        }
        Ok(Self(authority.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Port component, used by the dashboard as the server's short name.
    pub fn port(&self) -> Option<&str> {
        let (host, port) = self.0.rsplit_once(':')?;
        // bare IPv6 literal without a port, e.g. `[::1]`
        if host.is_empty() || port.is_empty() || port.ends_with(']') {
            return None;
        }
        Some(port)
    }

    /// Base URL with a trailing path segment appended, e.g. `http://host:8188/queue`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("http://{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServerAddress> for String {
    fn from(value: ServerAddress) -> Self {
        value.0
    }
}
