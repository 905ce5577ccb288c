//! Client configuration
//!
//! Loaded from a TOML file or string:
//!
//! ```toml
//! url = "https://search.internal:9200"
//! username = "elastic"
//! password = "changeme"
//! timeout_ms = 10000
//! # skip detection against the root endpoint
//! version = "opensearch:2.11.0"
//! ```

use crate::error::{ClientError, Result};
use quarry::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL of the cluster
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pinned engine version, `7.10.2` or `opensearch:2.11.0`
    #[serde(default)]
    pub version: Option<String>,
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            timeout_ms: default_timeout_ms(),
            version: None,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<url::Url> {
        Ok(url::Url::parse(&self.url)?)
    }

    /// The pinned version, if one is configured
    pub fn pinned_version(&self) -> Result<Option<Version>> {
        self.version
            .as_deref()
            .map(|v| v.parse::<Version>().map_err(ClientError::from))
            .transpose()
    }

    fn validate(&self) -> Result<()> {
        self.base_url()?;
        self.pinned_version()?;
        if self.password.is_some() && self.username.is_none() {
            return Err(ClientError::Config(
                "password given without username".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.url, "http://localhost:9200");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.pinned_version().unwrap().is_none());
    }

    #[test]
    fn test_pinned_version() {
        let config = ClientConfig::from_toml_str(r#"version = "opensearch:2.11.0""#).unwrap();
        assert_eq!(
            config.pinned_version().unwrap(),
            Some(Version::opensearch(2, 11, 0))
        );

        let config = ClientConfig::from_toml_str(r#"version = "6.8.23""#).unwrap();
        assert_eq!(
            config.pinned_version().unwrap(),
            Some(Version::elasticsearch(6, 8, 23))
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str(r#"url = "not a url""#),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(r#"version = "solr:9.0.0""#),
            Err(ClientError::Core(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(r#"password = "secret""#),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("timeout_ms = \"soon\""),
            Err(ClientError::Config(_))
        ));
    }
}
