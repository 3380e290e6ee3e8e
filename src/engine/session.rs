use std::collections::HashMap;

use crate::engine::template::{self, Facts};
use crate::{LookupContext, Result};

/// Values retrieved during one resolution session.
///
/// Entries are only ever appended. Once the bulk flag is set no further bulk
/// prefetch happens for the session. Drop the cache to end the session.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    entries: HashMap<String, String>,
    bulk_populated: bool,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Inserts `value` under `key`. A later put for the same key overwrites.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn is_bulk_populated(&self) -> bool {
        self.bulk_populated
    }

    pub fn mark_bulk_populated(&mut self) {
        self.bulk_populated = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The standard [`LookupContext`]: a session cache, the host's facts and an
/// optional explain trace.
///
/// Share one `Session` across every key of a resolution session and drop it
/// afterwards. It is not synchronized; hosts resolving keys concurrently must
/// guard it themselves.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cache: SessionCache,
    facts: Facts,
    explain: bool,
    explanations: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: Facts) -> Self {
        Self {
            facts,
            ..Self::default()
        }
    }

    /// Turns collection of explain messages on or off.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn session_cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Messages recorded so far; empty unless explain is on.
    pub fn explanations(&self) -> &[String] {
        &self.explanations
    }

    pub fn take_explanations(&mut self) -> Vec<String> {
        std::mem::take(&mut self.explanations)
    }
}

impl LookupContext for Session {
    fn cache_has_key(&self, key: &str) -> bool {
        self.cache.has(key)
    }

    fn cached_value(&self, key: &str) -> Option<&str> {
        self.cache.get(key)
    }

    fn cache(&mut self, key: &str, value: String) {
        self.cache.put(key, value);
    }

    fn is_bulk_populated(&self) -> bool {
        self.cache.is_bulk_populated()
    }

    fn mark_bulk_populated(&mut self) {
        self.cache.mark_bulk_populated();
    }

    fn interpolate(&self, template: &str) -> Result<String> {
        template::interpolate(template, &self.facts)
    }

    fn explain(&mut self, message: &str) {
        if self.explain {
            self.explanations.push(message.to_string());
        }
    }
}
