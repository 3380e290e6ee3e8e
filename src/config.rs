use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Backend configuration, supplied once by the host and read-only afterwards.
///
/// Field names follow the host option bag (`uri`, `get_all`, ...). Build it
/// with [`Configuration::from_value`] or the other constructors, which all
/// validate before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Base path template, e.g. `/%{environment}/app/`.
    #[serde(rename = "uri")]
    pub base_uri: String,

    /// Store region. `None` uses the environment's default region chain.
    #[serde(default)]
    pub region: Option<String>,

    /// Prefetch the whole subtree once per session and serve keys from cache.
    #[serde(rename = "get_all", alias = "bulk_mode", default)]
    pub bulk_mode: bool,

    /// Whether the bulk prefetch descends below the first level.
    #[serde(default)]
    pub recursive: bool,

    /// Ordered prefixes scoping this backend. Keys matching none are not found.
    #[serde(default)]
    pub key_prefixes: Option<Vec<String>>,

    #[serde(default = "default_hierarchy_separator")]
    pub hierarchy_separator: String,

    #[serde(default = "default_path_separator")]
    pub path_separator: String,
}

fn default_hierarchy_separator() -> String {
    "::".to_string()
}

fn default_path_separator() -> String {
    "/".to_string()
}

impl Configuration {
    /// A single-mode configuration for `base_uri` with every other option defaulted.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            region: None,
            bulk_mode: false,
            recursive: false,
            key_prefixes: None,
            hierarchy_separator: default_hierarchy_separator(),
            path_separator: default_path_separator(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_bulk_mode(mut self, bulk_mode: bool) -> Self {
        self.bulk_mode = bulk_mode;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_key_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Checks the invariants the resolver relies on.
    pub fn validate(&self) -> Result<()> {
        if self.base_uri.trim().is_empty() {
            return Err(Error::InvalidConfig("`uri` must not be empty".to_string()));
        }
        if self.hierarchy_separator.is_empty() {
            return Err(Error::InvalidConfig("`hierarchy_separator` must not be empty".to_string()));
        }
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(Error::InvalidConfig("`region` must not be blank when set".to_string()));
            }
        }
        Ok(())
    }
}
