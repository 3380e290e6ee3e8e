use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use log::warn;

use crate::{Connector, Error, Page, Parameter, ParameterStore, Result};

/// Largest page the real service hands out for a prefix listing.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// An in-process parameter store with Parameter Store listing semantics.
///
/// Names starting with `/` are hierarchical; names without one live at the
/// root and are listed under `/` by their bare name. Used for tests and for
/// offline fixtures. Counts every call so callers can assert on traffic.
pub struct MemoryStore {
    params: RwLock<BTreeMap<String, String>>,
    page_size: usize,
    failure: Mutex<Option<String>>,
    one_calls: AtomicUsize,
    prefix_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            params: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            failure: Mutex::new(None),
            one_calls: AtomicUsize::new(0),
            prefix_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            params: RwLock::new(params),
            ..Self::default()
        }
    }

    /// Loads a JSON object of `name -> value`.
    ///
    /// Numbers and booleans are stored in their JSON text form; other
    /// non-string values are skipped with a warning.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&content)?;

        let mut params = BTreeMap::new();
        for (name, value) in raw {
            let value = match value {
                serde_json::Value::String(s) => s,
                v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_)) => v.to_string(),
                other => {
                    warn!("Skipping fixture entry {} in {:?}: unsupported value {}", name, path, other);
                    continue;
                }
            };
            params.insert(name, value);
        }

        Ok(Self {
            params: RwLock::new(params),
            ..Self::default()
        })
    }

    /// Sets how many entries a listing page holds. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut params = self.params.write().unwrap_or_else(|e| e.into_inner());
        params.insert(name.into(), value.into());
    }

    /// Makes every following call fail with a service error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of `fetch_one` calls served so far.
    pub fn one_calls(&self) -> usize {
        self.one_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_by_prefix` calls (pages) served so far.
    pub fn prefix_calls(&self) -> usize {
        self.prefix_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.params.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(message) => Err(Error::Service(message.clone())),
            None => Ok(()),
        }
    }
}

/// Whether `name` is listed under `path`.
fn is_listed(name: &str, path: &str, recursive: bool) -> bool {
    let rest = if path == "/" {
        if !name.starts_with('/') {
            return true;
        }
        &name[1..]
    } else {
        let prefix = path.trim_end_matches('/');
        match name.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
            Some(rest) => rest,
            None => return false,
        }
    };
    !rest.is_empty() && (recursive || !rest.contains('/'))
}

#[async_trait]
impl ParameterStore for MemoryStore {
    async fn fetch_one(&self, path: &str) -> Result<Option<String>> {
        self.one_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let params = self.params.read().unwrap_or_else(|e| e.into_inner());
        Ok(params.get(path).cloned())
    }

    async fn fetch_by_prefix(&self, path: &str, recursive: bool, cursor: Option<&str>) -> Result<Page> {
        self.prefix_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let offset = match cursor {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::Service(format!("invalid next token: {}", token)))?,
            None => 0,
        };

        let params = self.params.read().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<Parameter> = params
            .iter()
            .filter(|(name, _)| is_listed(name, path, recursive))
            .map(|(name, value)| Parameter {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let entries = matching.get(offset..end).map(<[Parameter]>::to_vec).unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(Page { entries, next_cursor })
    }
}

/// Hands out one shared store regardless of region, counting connections.
pub struct StaticConnector {
    store: Arc<dyn ParameterStore>,
    connects: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl StaticConnector {
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Makes following connection attempts fail.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of connection attempts so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _region: Option<&str>) -> Result<Arc<dyn ParameterStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Err(Error::Connection(message.clone()));
        }
        Ok(self.store.clone())
    }
}
