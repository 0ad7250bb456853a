use crate::pages::PageLayout;
use crate::products::RetireMode;
use serde::Deserialize;
use stores::config::{
    BlobStoreConfig, CatalogConfig, StoreDirectoryConfig, ValidationError as StoresValidationError,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Request timeout cannot be 0")]
    InvalidRequestTimeout,

    #[error(transparent)]
    Stores(#[from] StoresValidationError),
}

/// Webhook service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener receiving CMS webhooks
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    pub admin_listener: Listener,
    /// Upper bound for handling one webhook. Timed out requests answer 503 so
    /// the CMS retries them.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub products: ProductsConfig,
    pub blob_store: BlobStoreConfig,
    pub catalog: CatalogConfig,
    pub store_directory: StoreDirectoryConfig,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidRequestTimeout);
        }

        self.catalog.validate()?;
        self.store_directory.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PagesConfig {
    #[serde(default)]
    pub layout: PageLayout,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ProductsConfig {
    #[serde(default)]
    pub retire_mode: RetireMode,
}
