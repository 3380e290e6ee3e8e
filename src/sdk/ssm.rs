//! AWS Systems Manager Parameter Store adapter.
//!
//! Every read asks the service to decrypt `SecureString` values. Retries,
//! backoff and timeouts are left to the SDK configuration.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::operation::get_parameters::GetParametersOutput;
use aws_sdk_ssm::operation::get_parameters_by_path::GetParametersByPathOutput;
use aws_sdk_ssm::Client;
use log::{debug, warn};

use crate::{Connector, Error, Page, Parameter, ParameterStore, Result};

/// A Parameter Store client bound to one region.
#[derive(Clone)]
pub struct SsmStore {
    client: Client,
}

impl Debug for SsmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsmStore")
            .field("region", &self.client.config().region())
            .finish()
    }
}

impl SsmStore {
    /// Loads the SDK configuration from the environment and builds a client.
    ///
    /// `region` overrides the default region chain. Fails when no region can
    /// be determined at all.
    pub async fn connect(region: Option<&str>) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(Error::Connection("no AWS region configured".to_string()));
        }
        if sdk_config.credentials_provider().is_none() {
            return Err(Error::Connection("no AWS credentials provider available".to_string()));
        }

        debug!("Connected to SSM in region {:?}", sdk_config.region());
        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }

    /// Wraps a pre-built client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmStore {
    async fn fetch_one(&self, path: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get_parameters()
            .names(path)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| Error::Service(format!("{}", DisplayErrorContext(&e))))?;

        Ok(value_from_output(&resp))
    }

    async fn fetch_by_prefix(&self, path: &str, recursive: bool, cursor: Option<&str>) -> Result<Page> {
        let resp = self
            .client
            .get_parameters_by_path()
            .path(path)
            .with_decryption(true)
            .recursive(recursive)
            .set_next_token(cursor.map(str::to_string))
            .send()
            .await
            .map_err(|e| Error::Service(format!("{}", DisplayErrorContext(&e))))?;

        Ok(page_from_output(&resp))
    }
}

/// The decrypted value of the first parameter returned, if any.
fn value_from_output(resp: &GetParametersOutput) -> Option<String> {
    resp.parameters().first().and_then(|p| p.value()).map(str::to_string)
}

/// Maps one listing response to a [`Page`], skipping incomplete entries.
fn page_from_output(resp: &GetParametersByPathOutput) -> Page {
    let mut entries = Vec::with_capacity(resp.parameters().len());
    for param in resp.parameters() {
        match (param.name(), param.value()) {
            (Some(name), Some(value)) => entries.push(Parameter {
                name: name.to_string(),
                value: value.to_string(),
            }),
            (name, _) => warn!("Skipping parameter without name or value: {:?}", name),
        }
    }

    Page {
        entries,
        next_cursor: resp.next_token().map(str::to_string),
    }
}

/// Connects to Parameter Store through the default AWS credential chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SsmConnector;

#[async_trait]
impl Connector for SsmConnector {
    async fn connect(&self, region: Option<&str>) -> Result<Arc<dyn ParameterStore>> {
        Ok(Arc::new(SsmStore::connect(region).await?))
    }
}
