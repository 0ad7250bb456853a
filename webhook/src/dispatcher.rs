//! Runs one webhook through decode, classification and the reconcilers.
use crate::classify::{EntryKind, Operation, classify_kind, classify_operation};
use crate::entry::decode_entry;
use crate::errors::{Result, WebhookError};
use crate::flatten::{LocalizedPage, PAGE_LOCALE_FIELDS, flatten_page, flatten_product};
use crate::metrics_defs::{ENTRIES, PAGES_FAILED};
use crate::pages::{PageAction, PageReconciler};
use crate::products::{ProductAction, ProductReconciler};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;
use stores::store_directory::StoreDirectory;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocaleFailure {
    pub locale: String,
    pub error: String,
}

/// Result of a handled webhook, serialized as the response body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_locales: Vec<LocaleFailure>,
    /// Nothing was written or removed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl Outcome {
    fn done(message: String) -> Self {
        Outcome {
            message,
            failed_locales: Vec::new(),
            skipped: false,
        }
    }

    fn skipped(message: String) -> Self {
        Outcome {
            message,
            failed_locales: Vec::new(),
            skipped: true,
        }
    }
}

pub struct Dispatcher {
    stores: Arc<dyn StoreDirectory>,
    pages: PageReconciler,
    products: ProductReconciler,
}

impl Dispatcher {
    pub fn new(
        stores: Arc<dyn StoreDirectory>,
        pages: PageReconciler,
        products: ProductReconciler,
    ) -> Self {
        Dispatcher {
            stores,
            pages,
            products,
        }
    }

    /// Handles one webhook body. `topic` is the raw topic header, empty when absent.
    ///
    /// Entries of unknown kind are reported before the store is looked up, so
    /// they never cause a store lookup or any write.
    pub async fn handle(&self, raw: &[u8], topic: &str, store_id: &str) -> Result<Outcome> {
        let entry = decode_entry(raw)?;
        let kind = classify_kind(entry.content_type_id());

        if kind == EntryKind::Unknown {
            counter!(ENTRIES, "kind" => kind.as_str(), "operation" => "none").increment(1);
            tracing::debug!(
                entry_id = entry.id(),
                content_type = entry.content_type_id(),
                "unsupported entry kind"
            );
            return Ok(Outcome::skipped(format!(
                "Only entries of type \"page*\" and \"product*\" are supported, got \"{}\"",
                entry.content_type_id()
            )));
        }

        if self.stores.get(store_id).await?.is_none() {
            return Err(WebhookError::StoreNotFound(store_id.to_string()));
        }

        let operation = classify_operation(topic);
        counter!(ENTRIES, "kind" => kind.as_str(), "operation" => operation.as_str())
            .increment(1);
        tracing::info!(
            entry_id = entry.id(),
            kind = kind.as_str(),
            operation = operation.as_str(),
            store_id,
            "handling entry"
        );

        if kind == EntryKind::Page {
            let pages = match flatten_page(&entry, PAGE_LOCALE_FIELDS) {
                Ok(pages) => pages,
                Err(missing) => {
                    tracing::info!(entry_id = entry.id(), error = %missing, "page not reconciled");
                    return Ok(Outcome::skipped(missing.to_string()));
                }
            };
            return Ok(self
                .handle_pages(entry.id(), store_id, topic, operation, pages)
                .await);
        }

        let product = flatten_product(&entry);
        match self.products.apply(operation, &product).await {
            Ok(ProductAction::Skipped) => Ok(Outcome::skipped(format!(
                "Product \"{}\" left untouched for topic \"{topic}\"",
                product.id
            ))),
            Ok(_) => Ok(Outcome::done(format!(
                "Product updated successfully \"{}\"",
                product.id
            ))),
            Err(WebhookError::MissingField(missing)) => {
                tracing::info!(entry_id = %product.id, error = %missing, "product not reconciled");
                Ok(Outcome::skipped(missing.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Applies the operation to every locale. A failing locale is recorded and
    /// the remaining ones are still attempted.
    async fn handle_pages(
        &self,
        entry_id: &str,
        store_id: &str,
        topic: &str,
        operation: Operation,
        pages: impl Iterator<Item = LocalizedPage>,
    ) -> Outcome {
        let mut failed_locales = Vec::new();
        let mut attempted = 0;
        let mut skipped = 0;

        for page in pages {
            attempted += 1;
            match self.pages.apply(store_id, operation, &page).await {
                Ok(PageAction::Skipped) => skipped += 1,
                Ok(_) => {}
                Err(e) => {
                    counter!(PAGES_FAILED).increment(1);
                    tracing::warn!(
                        entry_id,
                        store_id,
                        locale = %page.locale,
                        error = %e,
                        "failed to reconcile page locale"
                    );
                    failed_locales.push(LocaleFailure {
                        locale: page.locale,
                        error: e.to_string(),
                    });
                }
            }
        }

        if attempted > 0 && skipped == attempted {
            return Outcome::skipped(format!(
                "Page \"{entry_id}\" left untouched for topic \"{topic}\""
            ));
        }

        Outcome {
            message: format!("Page updated successfully \"{entry_id}\""),
            failed_locales,
            skipped: false,
        }
    }
}
