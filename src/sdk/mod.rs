/// Store adapters and connector selection.
///
/// This module holds the remote Parameter Store client, an in-memory store with
/// the same listing semantics, and the lazy page walker used for bulk prefetch.
pub mod discovery;
pub mod memory;
pub mod pages;
#[cfg(feature = "ssm")]
pub mod ssm;

pub use discovery::default_connector;
pub use memory::{MemoryStore, StaticConnector};
pub use pages::pages;
#[cfg(feature = "ssm")]
pub use ssm::{SsmConnector, SsmStore};
