use crate::catalog::Catalog;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Empty store id in static store directory")]
    EmptyStoreId,

    #[error("Duplicate catalog id: {0}")]
    DuplicateCatalog(String),

    #[error("Platform API timeout cannot be 0")]
    InvalidTimeout,
}

/// Where page artifacts are written.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum BlobStoreConfig {
    Filesystem { base_dir: PathBuf },
    Memory,
}

/// Connection settings for the commerce platform REST API.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct PlatformApiConfig {
    /// Base URL, e.g. `https://admin.example.com/platform`. Endpoint paths are appended to it.
    pub url: Url,
    /// Sent as the `api_key` header when present
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl PlatformApiConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum CatalogConfig {
    /// Process-local catalog seeded with the listed catalogs. Products do not survive a restart.
    Memory {
        #[serde(default)]
        catalogs: Vec<Catalog>,
    },
    Http(PlatformApiConfig),
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            CatalogConfig::Memory { catalogs } => {
                let mut ids = HashSet::new();
                for catalog in catalogs {
                    if !ids.insert(&catalog.id) {
                        return Err(ValidationError::DuplicateCatalog(catalog.id.clone()));
                    }
                }
                Ok(())
            }
            CatalogConfig::Http(api) => api.validate(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreDirectoryConfig {
    Static { stores: Vec<String> },
    Http(PlatformApiConfig),
}

impl StoreDirectoryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            StoreDirectoryConfig::Static { stores } => {
                if stores.iter().any(|s| s.trim().is_empty()) {
                    return Err(ValidationError::EmptyStoreId);
                }
                Ok(())
            }
            StoreDirectoryConfig::Http(api) => api.validate(),
        }
    }
}
