use crate::metrics_defs::{NEGATIVE_CACHE_HIT, NEGATIVE_CACHE_MISS};
use async_trait::async_trait;
use moka::sync::Cache;
use serde::Deserialize;
use shared::counter;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SIZE: u64 = 1000;
const TTL_SECS: u64 = 5;

#[derive(thiserror::Error, Debug)]
pub enum StoreDirectoryError {
    #[error("store API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid store API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Store {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Resolves a store identifier to a store, `None` when it does not exist.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn get(&self, store_id: &str) -> Result<Option<Store>, StoreDirectoryError>;
}

pub struct StaticStoreDirectory {
    stores: HashSet<String>,
}

impl StaticStoreDirectory {
    pub fn new<I, S>(stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticStoreDirectory {
            stores: stores.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl StoreDirectory for StaticStoreDirectory {
    async fn get(&self, store_id: &str) -> Result<Option<Store>, StoreDirectoryError> {
        Ok(self.stores.get(store_id).map(|id| Store {
            id: id.clone(),
            name: None,
        }))
    }
}

/// Wraps a directory and briefly remembers ids that did not resolve, so a CMS
/// retrying webhooks for an unknown store does not hit the backend every time.
pub struct CachedStoreDirectory {
    inner: Arc<dyn StoreDirectory>,
    not_found: Cache<String, ()>,
}

impl CachedStoreDirectory {
    pub fn new(inner: Arc<dyn StoreDirectory>) -> Self {
        Self::with_ttl(inner, Duration::from_secs(TTL_SECS))
    }

    pub fn with_ttl(inner: Arc<dyn StoreDirectory>, ttl: Duration) -> Self {
        let not_found = Cache::builder()
            .max_capacity(SIZE)
            .time_to_live(ttl)
            .build();

        CachedStoreDirectory { inner, not_found }
    }
}

#[async_trait]
impl StoreDirectory for CachedStoreDirectory {
    async fn get(&self, store_id: &str) -> Result<Option<Store>, StoreDirectoryError> {
        if self.not_found.contains_key(store_id) {
            counter!(NEGATIVE_CACHE_HIT).increment(1);
            return Ok(None);
        }
        counter!(NEGATIVE_CACHE_MISS).increment(1);

        let store = self.inner.get(store_id).await?;
        if store.is_none() {
            self.not_found.insert(store_id.to_string(), ());
        }
        Ok(store)
    }
}
