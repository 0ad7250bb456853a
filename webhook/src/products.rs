//! Reconciles product entries with catalog products.
//!
//! Publishing merges the entry into the product with the same SKU in the named
//! catalog: content becomes one `FullReview` per locale and every other field one
//! property value per locale. Reviews and property values the entry does not
//! mention are kept. A `contentfulid` property records which entry the product
//! came from so that unpublishing can find it again.
use crate::classify::Operation;
use crate::errors::{Result, WebhookError};
use crate::flatten::{MissingRequiredField, Product};
use crate::key_lock::KeyedLocks;
use crate::metrics_defs::{PRODUCTS_RETIRED, PRODUCTS_UPSERTED};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use shared::counter;
use std::sync::Arc;
use stores::catalog::{Catalog, CatalogProduct, CatalogService, PropertyValue, Review};

pub const REVIEW_TYPE: &str = "FullReview";
pub const PROVENANCE_PROPERTY: &str = "contentfulid";

/// What happens to a product when its entry is unpublished, deleted or archived.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetireMode {
    /// Keep the product but mark it inactive
    #[default]
    Deactivate,
    Delete,
}

impl RetireMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RetireMode::Deactivate => "deactivate",
            RetireMode::Delete => "delete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductAction {
    Created,
    Updated,
    Deactivated,
    Deleted,
    /// No product carries the entry id
    NotFound,
    Skipped,
}

pub struct ProductReconciler {
    catalog: Arc<dyn CatalogService>,
    retire_mode: RetireMode,
    locks: KeyedLocks,
}

impl ProductReconciler {
    pub fn new(catalog: Arc<dyn CatalogService>, retire_mode: RetireMode) -> Self {
        ProductReconciler {
            catalog,
            retire_mode,
            locks: KeyedLocks::new(),
        }
    }

    /// The single catalog whose name matches, ignoring case.
    async fn resolve_catalog(&self, name: &str) -> Result<Catalog> {
        let wanted = name.to_lowercase();
        let mut matches: Vec<Catalog> = self
            .catalog
            .list_catalogs()
            .await?
            .into_iter()
            .filter(|c| c.name.to_lowercase() == wanted)
            .collect();

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(WebhookError::CatalogNotFound(name.to_string())),
            n => Err(WebhookError::CatalogNotFound(format!(
                "{name} matches {n} catalogs"
            ))),
        }
    }

    pub async fn upsert(&self, product: &Product) -> Result<ProductAction> {
        if product.sku.is_empty() {
            return Err(MissingRequiredField("sku".to_string()).into());
        }

        let _entry_guard = self.locks.lock(&entry_key(&product.id)).await;
        let catalog = self.resolve_catalog(&product.catalog_name).await?;
        let _product_guard = self.locks.lock(&product_key(&catalog.id, &product.sku)).await;

        let (mut target, action) = match self
            .catalog
            .find_product_by_sku(&catalog.id, &product.sku)
            .await?
        {
            Some(mut existing) => {
                existing.name = product.name.clone();
                (existing, ProductAction::Updated)
            }
            None => (
                CatalogProduct::new(&catalog.id, &product.sku, &product.name),
                ProductAction::Created,
            ),
        };

        target.is_active = true;
        merge_reviews(&mut target.reviews, &product.content);
        merge_property_values(&mut target.property_values, product);
        self.catalog.save(std::slice::from_ref(&target)).await?;

        let created = action == ProductAction::Created;
        let created_label = if created { "true" } else { "false" };
        counter!(PRODUCTS_UPSERTED, "created" => created_label).increment(1);
        tracing::info!(
            entry_id = %product.id,
            catalog_id = %catalog.id,
            sku = %product.sku,
            created,
            "product upserted"
        );
        Ok(action)
    }

    /// Deactivates or deletes the product created from this entry. A product
    /// that cannot be found is left alone.
    pub async fn retire(&self, product: &Product) -> Result<ProductAction> {
        let _entry_guard = self.locks.lock(&entry_key(&product.id)).await;

        let Some(found) = self
            .catalog
            .find_product_by_property(PROVENANCE_PROPERTY, &product.id)
            .await?
        else {
            tracing::debug!(entry_id = %product.id, "no product to retire");
            return Ok(ProductAction::NotFound);
        };

        // Re-read under the product lock so a concurrent upsert is not overwritten
        let _product_guard = self
            .locks
            .lock(&product_key(&found.catalog_id, &found.code))
            .await;
        let Some(mut target) = self
            .catalog
            .find_product_by_sku(&found.catalog_id, &found.code)
            .await?
        else {
            tracing::debug!(entry_id = %product.id, "product vanished before retire");
            return Ok(ProductAction::NotFound);
        };

        let action = match self.retire_mode {
            RetireMode::Deactivate => {
                target.is_active = false;
                self.catalog.save(std::slice::from_ref(&target)).await?;
                ProductAction::Deactivated
            }
            RetireMode::Delete => {
                self.catalog.delete(std::slice::from_ref(&target.id)).await?;
                ProductAction::Deleted
            }
        };

        counter!(PRODUCTS_RETIRED, "mode" => self.retire_mode.as_str()).increment(1);
        tracing::info!(
            entry_id = %product.id,
            product_id = %target.id,
            mode = self.retire_mode.as_str(),
            "product retired"
        );
        Ok(action)
    }

    pub async fn apply(&self, operation: Operation, product: &Product) -> Result<ProductAction> {
        match operation {
            Operation::Publish => self.upsert(product).await,
            Operation::Unpublish | Operation::Delete | Operation::Archive => {
                self.retire(product).await
            }
            Operation::Unknown => {
                tracing::debug!(entry_id = %product.id, "unknown topic, product left untouched");
                Ok(ProductAction::Skipped)
            }
        }
    }
}

fn entry_key(entry_id: &str) -> String {
    format!("entry:{entry_id}")
}

fn product_key(catalog_id: &str, sku: &str) -> String {
    format!("product:{catalog_id}/{sku}")
}

/// Overwrites or appends one `FullReview` per locale of `content`.
pub fn merge_reviews(reviews: &mut Vec<Review>, content: &IndexMap<String, String>) {
    for (locale, text) in content {
        match reviews
            .iter_mut()
            .find(|r| r.review_type == REVIEW_TYPE && r.language_code == *locale)
        {
            Some(existing) => existing.content = text.clone(),
            None => reviews.push(Review {
                review_type: REVIEW_TYPE.to_string(),
                language_code: locale.clone(),
                content: text.clone(),
            }),
        }
    }
}

/// Overwrites or appends one value per field and locale of the product, plus
/// the locale-independent provenance property.
pub fn merge_property_values(values: &mut Vec<PropertyValue>, product: &Product) {
    let candidates = product
        .properties
        .iter()
        .flat_map(|(name, locales)| {
            locales
                .iter()
                .map(move |(locale, value)| (name.as_str(), Some(locale.as_str()), value.clone()))
        })
        .chain(std::iter::once((
            PROVENANCE_PROPERTY,
            None,
            JsonValue::String(product.id.clone()),
        )));

    for (name, locale, value) in candidates {
        match values
            .iter_mut()
            .find(|p| p.property_name == name && p.language_code.as_deref() == locale)
        {
            Some(existing) => existing.value = value,
            None => values.push(PropertyValue {
                property_name: name.to_string(),
                language_code: locale.map(String::from),
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use stores::catalog::{CatalogError, InMemoryCatalog};

    /// Answers provenance lookups with a fixed snapshot and everything else from `inner`.
    struct StaleProvenance {
        inner: Arc<InMemoryCatalog>,
        snapshot: CatalogProduct,
    }

    #[async_trait]
    impl CatalogService for StaleProvenance {
        async fn list_catalogs(&self) -> std::result::Result<Vec<Catalog>, CatalogError> {
            self.inner.list_catalogs().await
        }

        async fn find_product_by_sku(
            &self,
            catalog_id: &str,
            sku: &str,
        ) -> std::result::Result<Option<CatalogProduct>, CatalogError> {
            self.inner.find_product_by_sku(catalog_id, sku).await
        }

        async fn find_product_by_property(
            &self,
            _name: &str,
            _value: &str,
        ) -> std::result::Result<Option<CatalogProduct>, CatalogError> {
            Ok(Some(self.snapshot.clone()))
        }

        async fn save(&self, products: &[CatalogProduct]) -> std::result::Result<(), CatalogError> {
            self.inner.save(products).await
        }

        async fn delete(&self, product_ids: &[String]) -> std::result::Result<(), CatalogError> {
            self.inner.delete(product_ids).await
        }
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::new(vec![
            Catalog::new("main", "Main"),
            Catalog::new("outlet", "Outlet"),
        ]))
    }

    fn widget() -> Product {
        Product {
            id: "entry-1".into(),
            catalog_name: "Main".into(),
            sku: "ABC-1".into(),
            name: "Widget".into(),
            content: IndexMap::from([("en-US".to_string(), "Great".to_string())]),
            properties: IndexMap::from([(
                "color".to_string(),
                IndexMap::from([
                    ("en-US".to_string(), json!("red")),
                    ("de-DE".to_string(), json!("rot")),
                ]),
            )]),
        }
    }

    #[test]
    fn test_merge_reviews_keeps_unrelated() {
        let mut reviews = vec![
            Review {
                review_type: REVIEW_TYPE.into(),
                language_code: "en-US".into(),
                content: "old".into(),
            },
            Review {
                review_type: "QuickReview".into(),
                language_code: "en-US".into(),
                content: "short".into(),
            },
        ];
        let content = IndexMap::from([
            ("en-US".to_string(), "new".to_string()),
            ("de-DE".to_string(), "neu".to_string()),
        ]);

        merge_reviews(&mut reviews, &content);
        merge_reviews(&mut reviews, &content);

        assert_eq!(reviews.len(), 3);
        assert_eq!(reviews[0].content, "new");
        assert_eq!(reviews[1].content, "short");
        assert_eq!(reviews[2].language_code, "de-DE");
        assert_eq!(reviews[2].review_type, REVIEW_TYPE);
    }

    #[test]
    fn test_merge_property_values() {
        let mut values = vec![PropertyValue {
            property_name: "material".into(),
            language_code: Some("en-US".into()),
            value: json!("steel"),
        }];

        merge_property_values(&mut values, &widget());
        merge_property_values(&mut values, &widget());

        assert_eq!(values.len(), 4);
        assert_eq!(values[0].value, json!("steel"));
        assert_eq!(values[1].language_code.as_deref(), Some("en-US"));
        assert_eq!(values[2].value, json!("rot"));
        assert_eq!(values[3].property_name, PROVENANCE_PROPERTY);
        assert_eq!(values[3].language_code, None);
        assert_eq!(values[3].value, json!("entry-1"));
    }

    #[tokio::test]
    async fn test_upsert_creates_product() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);

        let mut product = widget();
        product.catalog_name = "MAIN".into();
        assert_eq!(
            reconciler.upsert(&product).await.unwrap(),
            ProductAction::Created
        );

        let stored = catalog.product("main", "ABC-1").unwrap();
        assert_eq!(stored.catalog_id, "main");
        assert_eq!(stored.code, "ABC-1");
        assert_eq!(stored.name, "Widget");
        assert!(stored.is_active);
        assert_eq!(stored.reviews.len(), 1);
        assert_eq!(
            stored.property(PROVENANCE_PROPERTY, None).unwrap().value,
            json!("entry-1")
        );
        assert!(reconciler.locks.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_updates_in_place() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);

        reconciler.upsert(&widget()).await.unwrap();
        let once = catalog.product("main", "ABC-1").unwrap();
        assert_eq!(
            reconciler.upsert(&widget()).await.unwrap(),
            ProductAction::Updated
        );
        assert_eq!(catalog.product("main", "ABC-1").unwrap(), once);

        let mut renamed = widget();
        renamed.name = "Widget Pro".into();
        renamed.content.insert("en-US".into(), "Even better".into());
        reconciler.upsert(&renamed).await.unwrap();

        assert_eq!(catalog.product_count(), 1);
        let stored = catalog.product("main", "ABC-1").unwrap();
        assert_eq!(stored.name, "Widget Pro");
        assert_eq!(stored.reviews.len(), 1);
        assert_eq!(stored.reviews[0].content, "Even better");
        assert_eq!(stored.property_values.len(), once.property_values.len());
    }

    #[tokio::test]
    async fn test_upsert_preserves_existing_data() {
        let catalog = catalog();
        let mut existing = CatalogProduct::new("main", "ABC-1", "Old name");
        existing.reviews.push(Review {
            review_type: "QuickReview".into(),
            language_code: "en-US".into(),
            content: "short".into(),
        });
        existing.property_values.push(PropertyValue {
            property_name: "material".into(),
            language_code: None,
            value: json!("steel"),
        });
        catalog.save(&[existing]).await.unwrap();

        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        assert_eq!(
            reconciler.upsert(&widget()).await.unwrap(),
            ProductAction::Updated
        );

        let stored = catalog.product("main", "ABC-1").unwrap();
        assert_eq!(stored.name, "Widget");
        assert_eq!(stored.reviews.len(), 2);
        assert_eq!(stored.property("material", None).unwrap().value, json!("steel"));
        assert_eq!(stored.property("color", Some("de-DE")).unwrap().value, json!("rot"));
    }

    #[tokio::test]
    async fn test_upsert_requires_single_catalog() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            Catalog::new("a", "Main"),
            Catalog::new("b", "main"),
        ]));
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);

        assert!(matches!(
            reconciler.upsert(&widget()).await,
            Err(WebhookError::CatalogNotFound(_))
        ));

        let mut product = widget();
        product.catalog_name = "Clearance".into();
        assert!(matches!(
            reconciler.upsert(&product).await,
            Err(WebhookError::CatalogNotFound(_))
        ));
        assert_eq!(catalog.product_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_requires_sku() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        let mut product = widget();
        product.sku.clear();

        assert!(matches!(
            reconciler.upsert(&product).await,
            Err(WebhookError::MissingField(MissingRequiredField(field))) if field == "sku"
        ));
        assert_eq!(catalog.product_count(), 0);
    }

    #[tokio::test]
    async fn test_retire_deactivates() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        reconciler.upsert(&widget()).await.unwrap();

        for op in [Operation::Unpublish, Operation::Delete, Operation::Archive] {
            assert_eq!(
                reconciler.apply(op, &widget()).await.unwrap(),
                ProductAction::Deactivated
            );
        }
        let stored = catalog.product("main", "ABC-1").unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_retire_saves_latest_product() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        reconciler.upsert(&widget()).await.unwrap();
        let snapshot = catalog.product("main", "ABC-1").unwrap();

        // Lands between the provenance lookup and the save
        let mut update = widget();
        update.content = IndexMap::from([("fr-FR".to_string(), "Super".to_string())]);
        reconciler.upsert(&update).await.unwrap();

        let retiring = ProductReconciler::new(
            Arc::new(StaleProvenance {
                inner: catalog.clone(),
                snapshot,
            }),
            RetireMode::Deactivate,
        );
        assert_eq!(
            retiring.retire(&widget()).await.unwrap(),
            ProductAction::Deactivated
        );

        let stored = catalog.product("main", "ABC-1").unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.reviews.len(), 2);
        assert!(retiring.locks.is_empty());
    }

    #[tokio::test]
    async fn test_sku_taken_in_another_catalog_is_not_overwritten() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        reconciler.upsert(&widget()).await.unwrap();
        let main = catalog.product("main", "ABC-1").unwrap();

        let mut outlet = widget();
        outlet.id = "entry-2".into();
        outlet.catalog_name = "Outlet".into();
        outlet.content.clear();
        assert!(matches!(
            reconciler.upsert(&outlet).await,
            Err(WebhookError::Catalog(CatalogError::IdConflict { .. }))
        ));

        assert_eq!(catalog.product_count(), 1);
        assert_eq!(catalog.product("main", "ABC-1").unwrap(), main);
        assert!(reconciler.locks.is_empty());
    }

    #[tokio::test]
    async fn test_retire_deletes() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Delete);
        reconciler.upsert(&widget()).await.unwrap();

        assert_eq!(
            reconciler.retire(&widget()).await.unwrap(),
            ProductAction::Deleted
        );
        assert_eq!(catalog.product_count(), 0);
        assert_eq!(
            reconciler.retire(&widget()).await.unwrap(),
            ProductAction::NotFound
        );
    }

    #[tokio::test]
    async fn test_retire_unknown_entry_is_noop() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        // Retiring does not need catalog or sku
        let product = Product {
            id: "never-published".into(),
            ..Default::default()
        };
        assert_eq!(
            reconciler.retire(&product).await.unwrap(),
            ProductAction::NotFound
        );
    }

    #[tokio::test]
    async fn test_unknown_operation_is_skipped() {
        let catalog = catalog();
        let reconciler = ProductReconciler::new(catalog.clone(), RetireMode::Deactivate);
        assert_eq!(
            reconciler
                .apply(Operation::Unknown, &widget())
                .await
                .unwrap(),
            ProductAction::Skipped
        );
        assert_eq!(catalog.product_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_do_not_duplicate() {
        let catalog = catalog();
        let reconciler = Arc::new(ProductReconciler::new(
            catalog.clone(),
            RetireMode::Deactivate,
        ));

        let mut tasks = Vec::new();
        for locale in ["en-US", "de-DE", "fr-FR", "es-ES"] {
            let reconciler = reconciler.clone();
            let mut product = widget();
            product.content = IndexMap::from([(locale.to_string(), locale.to_string())]);
            tasks.push(tokio::spawn(
                async move { reconciler.upsert(&product).await },
            ));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(catalog.product_count(), 1);
        assert_eq!(catalog.product("main", "ABC-1").unwrap().reviews.len(), 4);
    }
}
