use std::sync::Arc;

use futures::TryStreamExt;
use log::{debug, info};
use tokio::sync::OnceCell;

use crate::engine::key_path::{self, KeyPath};
use crate::sdk::{self, pages};
use crate::{Configuration, Connector, Lookup, LookupContext, LookupKey, ParameterStore, Result};

/// Answers key lookups for one configured backend.
///
/// Built once with its configuration and connector; the store connection is
/// opened on first need and reused for every later key. All session state
/// lives in the [`LookupContext`] passed to [`Resolver::lookup`].
pub struct Resolver {
    config: Configuration,
    connector: Arc<dyn Connector>,
    store: OnceCell<Arc<dyn ParameterStore>>,
}

impl Resolver {
    /// Validates `config` and binds it to `connector`.
    pub fn new(config: Configuration, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            store: OnceCell::new(),
        })
    }

    /// Uses the connector chosen by [`sdk::default_connector`].
    pub fn with_default_connector(config: Configuration) -> Result<Self> {
        Self::new(config, sdk::default_connector()?)
    }

    /// Uses an already connected store.
    pub fn with_store(config: Configuration, store: Arc<dyn ParameterStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(sdk::StaticConnector::new(store.clone())),
            store: OnceCell::new_with(Some(store)),
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Resolves one key within the session held by `ctx`.
    ///
    /// Returns `Lookup::NotFound` when the key is out of scope or absent. Any
    /// connection or service fault is returned as an error and nothing is
    /// cached for the key. A bulk prefetch that fails part way is retried by
    /// the next lookup in the same session.
    pub async fn lookup<C>(&self, key: impl Into<LookupKey>, ctx: &mut C) -> Result<Lookup>
    where
        C: LookupContext + ?Sized,
    {
        let key = key.into();
        let path = match key_path::build(key.as_str(), &self.config, &*ctx)? {
            Some(path) => path,
            None => {
                debug!("Key {} matches no configured prefix", key);
                ctx.explain(&format!("Key {} matches no configured prefix", key));
                return Ok(Lookup::NotFound);
            }
        };

        if self.config.bulk_mode {
            self.lookup_bulk(&path, ctx).await
        } else {
            self.lookup_single(&path, ctx).await
        }
    }

    async fn lookup_bulk<C>(&self, path: &KeyPath, ctx: &mut C) -> Result<Lookup>
    where
        C: LookupContext + ?Sized,
    {
        if ctx.is_bulk_populated() {
            ctx.explain("Cache populated");
        } else {
            ctx.explain("No cache, caching...");
            self.prefetch(&path.base_path, ctx).await?;
        }

        // Root-level parameters come back under their bare name, nested ones
        // under their full path.
        for candidate in [&path.effective_key, &path.store_path] {
            if let Some(value) = ctx.cached_value(candidate) {
                let value = value.to_string();
                debug!("Bulk cache hit for {}", candidate);
                ctx.explain(&format!("Returning value for {}", candidate));
                return Ok(Lookup::Found(value));
            }
        }

        debug!("Key {} not found in bulk cache", path.store_path);
        ctx.explain(&format!("Key {} not found", path.effective_key));
        Ok(Lookup::NotFound)
    }

    /// Drains every page under `base_path` into the session cache.
    ///
    /// The bulk flag is only set once the last page is in; on error it stays
    /// unset and entries already cached are kept.
    async fn prefetch<C>(&self, base_path: &str, ctx: &mut C) -> Result<()>
    where
        C: LookupContext + ?Sized,
    {
        let store = self.store().await?;
        ctx.explain(&format!("Getting keys on {} ...", base_path));

        let mut pages = Box::pin(pages(store.as_ref(), base_path, self.config.recursive));
        let (mut page_count, mut entry_count) = (0usize, 0usize);
        while let Some(page) = pages.try_next().await? {
            page_count += 1;
            entry_count += page.entries.len();
            ctx.explain("Adding keys on cache ...");
            for param in page.entries {
                ctx.cache(&param.name, param.value);
            }
        }

        ctx.mark_bulk_populated();
        ctx.explain("Marking cache as populated");
        info!(
            "Prefetched {} parameters under {} in {} page(s)",
            entry_count, base_path, page_count
        );
        Ok(())
    }

    async fn lookup_single<C>(&self, path: &KeyPath, ctx: &mut C) -> Result<Lookup>
    where
        C: LookupContext + ?Sized,
    {
        if let Some(value) = ctx.cached_value(&path.store_path) {
            let value = value.to_string();
            debug!("Cache hit for {}", path.store_path);
            ctx.explain(&format!("Returning cached value for {}", path.store_path));
            return Ok(Lookup::Found(value));
        }

        ctx.explain(&format!("Looking for {}", path.store_path));
        let store = self.store().await?;
        match store.fetch_one(&path.store_path).await? {
            Some(value) => {
                debug!("Fetched {}", path.store_path);
                ctx.cache(&path.store_path, value.clone());
                Ok(Lookup::Found(value))
            }
            None => {
                debug!("Key {} not found", path.store_path);
                ctx.explain(&format!("Key {} not found", path.store_path));
                Ok(Lookup::NotFound)
            }
        }
    }

    async fn store(&self) -> Result<&Arc<dyn ParameterStore>> {
        self.store
            .get_or_try_init(|| async {
                debug!("Connecting to parameter store (region: {:?})", self.config.region);
                self.connector.connect(self.config.region.as_deref()).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Session;
    use crate::sdk::{MemoryStore, StaticConnector};
    use crate::Error;

    fn resolver(config: Configuration, store: &Arc<MemoryStore>) -> (Resolver, Arc<StaticConnector>) {
        let connector = Arc::new(StaticConnector::new(store.clone()));
        (Resolver::new(config, connector.clone()).unwrap(), connector)
    }

    #[tokio::test]
    async fn test_single_mode_found_and_cached() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/db/password", "s3cret")]));
        let config = Configuration::new("/app/").with_key_prefixes(["dept::"]);
        let (resolver, _) = resolver(config, &store);
        let mut session = Session::new();

        let first = resolver.lookup("dept::db::password", &mut session).await.unwrap();
        let second = resolver.lookup("dept::db::password", &mut session).await.unwrap();

        assert_eq!(first, Lookup::Found("s3cret".to_string()));
        assert_eq!(second, first);
        assert_eq!(store.one_calls(), 1);
        assert_eq!(session.session_cache().get("/app/db/password"), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_unmatched_prefix_never_connects() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/x", "v")]));
        let config = Configuration::new("/app/").with_key_prefixes(["dept::"]);
        let (resolver, connector) = resolver(config, &store);
        let mut session = Session::new();

        let res = resolver.lookup("other::x", &mut session).await.unwrap();
        assert_eq!(res, Lookup::NotFound);
        assert_eq!(connector.connects(), 0);
        assert_eq!(store.one_calls() + store.prefix_calls(), 0);
    }

    #[tokio::test]
    async fn test_single_mode_miss_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let (resolver, _) = resolver(Configuration::new("/app/"), &store);
        let mut session = Session::new();

        assert_eq!(resolver.lookup("missing", &mut session).await.unwrap(), Lookup::NotFound);
        assert_eq!(resolver.lookup("missing", &mut session).await.unwrap(), Lookup::NotFound);
        assert_eq!(store.one_calls(), 2);
        assert!(session.session_cache().is_empty());
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/a", "1"), ("/app/b", "2")]));
        let (resolver, connector) = resolver(Configuration::new("/app/"), &store);
        let mut session = Session::new();

        resolver.lookup("a", &mut session).await.unwrap();
        resolver.lookup("b", &mut session).await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried_on_next_key() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/a", "1")]));
        let (resolver, connector) = resolver(Configuration::new("/app/"), &store);
        let mut session = Session::new();

        connector.fail_with("expired token");
        let res = resolver.lookup("a", &mut session).await;
        assert!(matches!(res, Err(Error::Connection(_))));

        connector.recover();
        assert!(resolver.lookup("a", &mut session).await.unwrap().is_found());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_bulk_mode_serves_from_single_prefetch() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/a", "1"), ("/app/b", "2")]));
        let config = Configuration::new("/app/").with_bulk_mode(true);
        let (resolver, _) = resolver(config, &store);
        let mut session = Session::new();

        assert_eq!(resolver.lookup("a", &mut session).await.unwrap().value(), Some("1"));
        assert_eq!(resolver.lookup("b", &mut session).await.unwrap().value(), Some("2"));
        assert_eq!(resolver.lookup("c", &mut session).await.unwrap(), Lookup::NotFound);
        assert_eq!(store.prefix_calls(), 1);
        assert_eq!(store.one_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_prefetch_is_retried_by_next_lookup() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/a", "1")]));
        let (resolver, _) = resolver(Configuration::new("/app/").with_bulk_mode(true), &store);
        let mut session = Session::new();

        store.fail_with("ThrottlingException");
        assert!(matches!(resolver.lookup("a", &mut session).await, Err(Error::Service(_))));
        assert!(!session.is_bulk_populated());

        store.recover();
        assert_eq!(resolver.lookup("a", &mut session).await.unwrap().value(), Some("1"));
        assert!(session.is_bulk_populated());
        assert_eq!(store.prefix_calls(), 2);
    }

    #[tokio::test]
    async fn test_explain_trace() {
        let store = Arc::new(MemoryStore::from_pairs([("/app/a", "1")]));
        let (resolver, _) = resolver(Configuration::new("/app/"), &store);
        let mut session = Session::new().with_explain(true);

        resolver.lookup("a", &mut session).await.unwrap();
        resolver.lookup("a", &mut session).await.unwrap();
        assert_eq!(
            session.explanations(),
            ["Looking for /app/a".to_string(), "Returning cached value for /app/a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_with_store_skips_connector() {
        let store: Arc<dyn ParameterStore> = Arc::new(MemoryStore::from_pairs([("/app/a", "1")]));
        let resolver = Resolver::with_store(Configuration::new("/app/"), store).unwrap();
        let mut session = Session::new();
        assert!(resolver.lookup("a", &mut session).await.unwrap().is_found());
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let store = Arc::new(MemoryStore::new());
        let res = Resolver::new(Configuration::new(""), Arc::new(StaticConnector::new(store)));
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }
}
