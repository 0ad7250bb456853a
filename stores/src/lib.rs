//! Collaborator boundaries of the webhook pipeline: the blob store holding page
//! artifacts, the product catalog, and the store directory.
pub mod blob;
pub mod catalog;
pub mod config;
pub mod metrics_defs;
pub mod platform_client;
pub mod store_directory;

use blob::{BlobStore, FilesystemBlobStore, InMemoryBlobStore};
use catalog::{CatalogService, InMemoryCatalog};
use config::{BlobStoreConfig, CatalogConfig, StoreDirectoryConfig};
use platform_client::HttpPlatformClient;
use std::sync::Arc;
use store_directory::{CachedStoreDirectory, StaticStoreDirectory, StoreDirectory};

pub fn get_blob_store(config: &BlobStoreConfig) -> Arc<dyn BlobStore> {
    match config {
        BlobStoreConfig::Filesystem { base_dir } => {
            tracing::info!(base_dir = %base_dir.display(), "using filesystem blob store");
            Arc::new(FilesystemBlobStore::new(base_dir.clone()))
        }
        BlobStoreConfig::Memory => {
            tracing::warn!("using in-memory blob store, page artifacts are lost on restart");
            Arc::new(InMemoryBlobStore::new())
        }
    }
}

pub fn get_catalog(config: &CatalogConfig) -> Result<Arc<dyn CatalogService>, reqwest::Error> {
    match config {
        CatalogConfig::Memory { catalogs } => {
            tracing::warn!(
                catalogs = catalogs.len(),
                "using in-memory catalog, products are lost on restart"
            );
            Ok(Arc::new(InMemoryCatalog::new(catalogs.clone())))
        }
        CatalogConfig::Http(api) => Ok(Arc::new(HttpPlatformClient::new(api)?)),
    }
}

/// Every directory is wrapped in the negative cache.
pub fn get_store_directory(
    config: &StoreDirectoryConfig,
) -> Result<Arc<dyn StoreDirectory>, reqwest::Error> {
    let inner: Arc<dyn StoreDirectory> = match config {
        StoreDirectoryConfig::Static { stores } => {
            Arc::new(StaticStoreDirectory::new(stores.iter().cloned()))
        }
        StoreDirectoryConfig::Http(api) => Arc::new(HttpPlatformClient::new(api)?),
    };
    Ok(Arc::new(CachedStoreDirectory::new(inner)))
}
