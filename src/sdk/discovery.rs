use std::env;
use std::path::Path;
use std::sync::Arc;

use crate::sdk::{MemoryStore, StaticConnector};
use crate::{Connector, Result};

/// Environment variable pointing at a JSON fixture to serve instead of AWS.
pub const FIXTURE_ENV: &str = "SSM_LOOKUP_FIXTURE";

/// Returns the connector a backend should use.
///
/// 1. If `SSM_LOOKUP_FIXTURE` is set and non-empty, parameters are served
///    from that JSON file by a [`MemoryStore`].
/// 2. Otherwise Parameter Store is used, which requires the `ssm` feature.
///    Without it this fails with [`Error::MissingDependency`](crate::Error::MissingDependency)
///    before any key is looked up.
pub fn default_connector() -> Result<Arc<dyn Connector>> {
    if let Ok(path) = env::var(FIXTURE_ENV) {
        if !path.is_empty() {
            return fixture_connector(path);
        }
    }
    ssm_connector()
}

/// Serves the parameters in a JSON fixture file.
pub fn fixture_connector<P: AsRef<Path>>(path: P) -> Result<Arc<dyn Connector>> {
    let store = MemoryStore::from_path(path)?;
    log::info!("Serving {} parameters from fixture", store.len());
    Ok(Arc::new(StaticConnector::new(Arc::new(store))))
}

#[cfg(feature = "ssm")]
fn ssm_connector() -> Result<Arc<dyn Connector>> {
    Ok(Arc::new(crate::sdk::SsmConnector))
}

#[cfg(not(feature = "ssm"))]
fn ssm_connector() -> Result<Arc<dyn Connector>> {
    Err(crate::Error::MissingDependency(
        "Parameter Store support requires building with the `ssm` feature".to_string(),
    ))
}
