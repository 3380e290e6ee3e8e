//! SSM Lookup resolves logical configuration keys against a hierarchical
//! key/value parameter store (AWS Systems Manager Parameter Store).
//!
//! A host configuration framework calls the [`Resolver`](engine::Resolver) once per
//! key. Keys such as `dept::db::password` are scoped by an optional list of
//! prefixes, translated to store paths (`/app/db/password`) and answered either
//! by a single fetch or from one bulk prefetch of the whole subtree. Retrieved
//! values are kept in a [`Session`](engine::Session) cache that lives exactly as
//! long as one resolution session.
//!
//! ## Core Components
//! - [`config`]: Typed backend configuration, validated once.
//! - [`engine`]: Key path building, interpolation, the session cache and the resolver.
//! - [`sdk`]: Store adapters (AWS SSM and in-memory) and connector discovery.

pub mod config;
pub mod engine;
pub mod sdk;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use config::Configuration;
pub use engine::{Resolver, Session};

/// Errors returned while resolving keys.
#[derive(Error, Debug)]
pub enum Error {
    /// The store connection or its authentication could not be established.
    #[error("failed to connect to parameter store: {0}")]
    Connection(String),
    /// The store reported a fault while fetching parameters.
    #[error("parameter store service error: {0}")]
    Service(String),
    /// Store client support is not available in this build.
    #[error("missing dependency: {0}")]
    MissingDependency(String),
    /// The backend configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A base URI template could not be interpolated.
    #[error("interpolation error: {0}")]
    Interpolation(String),
    /// An I/O error occurred while loading configuration or fixtures.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a single key lookup. Failures travel as [`Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key resolved to a value.
    Found(String),
    /// The key is absent, or out of scope for this backend.
    NotFound,
}

impl Lookup {
    /// Returns the value, if one was found.
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// A raw key as handed over by the host. Numeric keys are coerced to strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LookupKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for LookupKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for LookupKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

macro_rules! numeric_lookup_key {
    ($($t:ty),*) => {
        $(impl From<$t> for LookupKey {
            fn from(key: $t) -> Self {
                Self(key.to_string())
            }
        })*
    };
}

numeric_lookup_key!(i32, i64, u32, u64, usize, f64);

/// A single parameter as returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Parameter>,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Read primitives of a remote parameter store.
///
/// Implementations decrypt secure values before returning them and own any
/// retry or timeout policy; callers never retry.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetches the value stored at exactly `path`. `Ok(None)` means absent.
    async fn fetch_one(&self, path: &str) -> Result<Option<String>>;

    /// Lists parameters under `path`, one page at a time.
    ///
    /// Pass the previous page's `next_cursor` to continue; a page without a
    /// cursor is the last one.
    async fn fetch_by_prefix(&self, path: &str, recursive: bool, cursor: Option<&str>) -> Result<Page>;
}

/// Opens connections to a parameter store.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects using `region`, or the environment's default region when `None`.
    async fn connect(&self, region: Option<&str>) -> Result<Arc<dyn ParameterStore>>;
}

/// The capabilities the resolver needs from the host for one session.
///
/// [`Session`] is the standard implementation; hosts with their own cache or
/// trace facility implement this trait instead.
pub trait LookupContext {
    fn cache_has_key(&self, key: &str) -> bool;
    fn cached_value(&self, key: &str) -> Option<&str>;
    /// Appends a value to the session cache.
    fn cache(&mut self, key: &str, value: String);
    fn is_bulk_populated(&self) -> bool;
    fn mark_bulk_populated(&mut self);
    /// Resolves `%{...}` tokens in `template` against the host's facts.
    fn interpolate(&self, template: &str) -> Result<String>;
    /// Records a trace message for the host's explain facility.
    fn explain(&mut self, message: &str);
}
