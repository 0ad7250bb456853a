//! REST client for the commerce platform that owns catalogs and stores.
//!
//! Endpoints used:
//!
//! - `GET    /api/catalog/catalogs`
//! - `POST   /api/catalog/search/products` with `{"catalogId", "skus"}` or `{"searchPhrase"}`
//! - `POST   /api/catalog/products` with an array of products (create or update)
//! - `DELETE /api/catalog/products?ids=...`
//! - `GET    /api/stores/{id}` (`404`/`204` when the store does not exist)

use crate::catalog::{Catalog, CatalogError, CatalogProduct, CatalogService};
use crate::config::PlatformApiConfig;
use crate::metrics_defs::PLATFORM_REQUEST_DURATION;
use crate::store_directory::{Store, StoreDirectory, StoreDirectoryError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shared::histogram;
use std::time::{Duration, Instant};
use url::Url;

const API_KEY_HEADER: &str = "api_key";

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProductSearchCriteria<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skus: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_phrase: Option<String>,
    take: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSearchResult {
    #[serde(default)]
    results: Vec<CatalogProduct>,
}

#[derive(Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpPlatformClient {
    pub fn new(config: &PlatformApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpPlatformClient {
            client,
            base_url: directory_url(&config.url),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let start = Instant::now();
        let result = builder.send().await;
        histogram!(PLATFORM_REQUEST_DURATION, "operation" => operation)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn search_products(
        &self,
        criteria: ProductSearchCriteria<'_>,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        let url = self.url("api/catalog/search/products")?;
        let builder = self
            .request(reqwest::Method::POST, url.clone())
            .json(&criteria);
        let response = self.send("search_products", builder).await?;
        let response = ensure_success(response, &url)?;
        let result = response.json::<ProductSearchResult>().await?;
        Ok(result.results.into_iter().next())
    }
}

/// Relative joins replace the last path segment unless the base ends with `/`.
fn directory_url(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn ensure_success(
    response: reqwest::Response,
    url: &Url,
) -> Result<reqwest::Response, CatalogError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(CatalogError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl CatalogService for HttpPlatformClient {
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, CatalogError> {
        let url = self.url("api/catalog/catalogs")?;
        let builder = self.request(reqwest::Method::GET, url.clone());
        let response = self.send("list_catalogs", builder).await?;
        Ok(ensure_success(response, &url)?.json().await?)
    }

    async fn find_product_by_sku(
        &self,
        catalog_id: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        self.search_products(ProductSearchCriteria {
            catalog_id: Some(catalog_id),
            skus: vec![sku],
            take: 1,
            ..Default::default()
        })
        .await
    }

    async fn find_product_by_property(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        self.search_products(ProductSearchCriteria {
            search_phrase: Some(format!("{name}:{value}")),
            take: 1,
            ..Default::default()
        })
        .await
    }

    async fn save(&self, products: &[CatalogProduct]) -> Result<(), CatalogError> {
        let url = self.url("api/catalog/products")?;
        let builder = self
            .request(reqwest::Method::POST, url.clone())
            .json(products);
        let response = self.send("save_products", builder).await?;
        ensure_success(response, &url)?;
        Ok(())
    }

    async fn delete(&self, product_ids: &[String]) -> Result<(), CatalogError> {
        let mut url = self.url("api/catalog/products")?;
        {
            let mut query = url.query_pairs_mut();
            for id in product_ids {
                query.append_pair("ids", id);
            }
        }
        let builder = self.request(reqwest::Method::DELETE, url.clone());
        let response = self.send("delete_products", builder).await?;
        ensure_success(response, &url)?;
        Ok(())
    }
}

#[async_trait]
impl StoreDirectory for HttpPlatformClient {
    async fn get(&self, store_id: &str) -> Result<Option<Store>, StoreDirectoryError> {
        let mut url = self.url("api/stores/")?;
        // Pushing as a segment percent-encodes anything unusual in the id
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(store_id);
        }

        let builder = self.request(reqwest::Method::GET, url.clone());
        let response = self.send("get_store", builder).await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Store>().await?)),
            status => Err(StoreDirectoryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}
