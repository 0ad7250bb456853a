//! Catalog collaborator: catalogs, products, editorial reviews and property values.
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("catalog API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid catalog API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("product id {id} already belongs to {catalog_id}/{code}")]
    IdConflict {
        id: String,
        catalog_id: String,
        code: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub id: String,
    pub name: String,
}

impl Catalog {
    pub fn new<I, N>(id: I, name: N) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Catalog {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub review_type: String,
    pub language_code: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub property_name: String,
    /// `None` for locale-independent values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    pub value: JsonValue,
}

/// A product row in the catalog, identified by `(catalog_id, code)` where `code` is the SKU.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub id: String,
    pub catalog_id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub property_values: Vec<PropertyValue>,
}

impl CatalogProduct {
    /// A product that does not exist in the catalog yet. Its id is the SKU.
    pub fn new(catalog_id: &str, sku: &str, name: &str) -> Self {
        CatalogProduct {
            id: sku.to_string(),
            catalog_id: catalog_id.to_string(),
            code: sku.to_string(),
            name: name.to_string(),
            is_active: false,
            reviews: Vec::new(),
            property_values: Vec::new(),
        }
    }

    pub fn property(&self, name: &str, language_code: Option<&str>) -> Option<&PropertyValue> {
        self.property_values
            .iter()
            .find(|p| p.property_name == name && p.language_code.as_deref() == language_code)
    }
}

/// Lookup-and-save access to the catalog. Nothing is cached between calls.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, CatalogError>;

    async fn find_product_by_sku(
        &self,
        catalog_id: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError>;

    /// Finds the first product carrying a property value `name` equal to the string `value`.
    async fn find_product_by_property(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError>;

    async fn save(&self, products: &[CatalogProduct]) -> Result<(), CatalogError>;

    async fn delete(&self, product_ids: &[String]) -> Result<(), CatalogError>;
}

/// `(catalog_id, code)`
type ProductKey = (String, String);

#[derive(Default)]
struct InMemoryState {
    catalogs: Vec<Catalog>,
    products: HashMap<ProductKey, CatalogProduct>,
}

/// Process-local catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<InMemoryState>,
}

impl InMemoryCatalog {
    pub fn new(catalogs: Vec<Catalog>) -> Self {
        InMemoryCatalog {
            state: RwLock::new(InMemoryState {
                catalogs,
                products: HashMap::new(),
            }),
        }
    }

    pub fn product(&self, catalog_id: &str, sku: &str) -> Option<CatalogProduct> {
        self.state
            .read()
            .products
            .get(&(catalog_id.to_string(), sku.to_string()))
            .cloned()
    }

    pub fn product_count(&self) -> usize {
        self.state.read().products.len()
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, CatalogError> {
        Ok(self.state.read().catalogs.clone())
    }

    async fn find_product_by_sku(
        &self,
        catalog_id: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self.product(catalog_id, sku))
    }

    async fn find_product_by_property(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self
            .state
            .read()
            .products
            .values()
            .find(|p| {
                p.property_values
                    .iter()
                    .any(|pv| pv.property_name == name && pv.value.as_str() == Some(value))
            })
            .cloned())
    }

    async fn save(&self, products: &[CatalogProduct]) -> Result<(), CatalogError> {
        let mut state = self.state.write();

        // Nothing is written when any product would take over another row's id
        for product in products {
            if let Some(owner) = state.products.values().find(|p| {
                p.id == product.id
                    && (p.catalog_id != product.catalog_id || p.code != product.code)
            }) {
                return Err(CatalogError::IdConflict {
                    id: product.id.clone(),
                    catalog_id: owner.catalog_id.clone(),
                    code: owner.code.clone(),
                });
            }
        }

        for product in products {
            let key = (product.catalog_id.clone(), product.code.clone());
            state.products.insert(key, product.clone());
        }
        Ok(())
    }

    async fn delete(&self, product_ids: &[String]) -> Result<(), CatalogError> {
        self.state
            .write()
            .products
            .retain(|_, p| !product_ids.contains(&p.id));
        Ok(())
    }
}
