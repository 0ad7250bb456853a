pub mod api;
pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod errors;
pub mod flatten;
pub mod key_lock;
pub mod metrics_defs;
pub mod pages;
pub mod products;
pub mod render;

use api::WebhookService;
use config::Config;
use dispatcher::Dispatcher;
use errors::{Result, WebhookError};
use pages::PageReconciler;
use products::ProductReconciler;
use render::HtmlRenderer;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::time::Duration;
use stores::catalog::CatalogError;
use stores::store_directory::StoreDirectoryError;

/// Wires the collaborators named in the config into a dispatcher.
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let blobs = stores::get_blob_store(&config.blob_store);
    let catalog = stores::get_catalog(&config.catalog).map_err(CatalogError::from)?;
    let directory =
        stores::get_store_directory(&config.store_directory).map_err(StoreDirectoryError::from)?;

    Ok(Dispatcher::new(
        directory,
        PageReconciler::new(blobs, Arc::new(HtmlRenderer), config.pages.layout),
        ProductReconciler::new(catalog, config.products.retire_mode),
    ))
}

pub async fn run(config: Config) -> Result<()> {
    let dispatcher = Arc::new(build_dispatcher(&config)?);

    let webhook_service = WebhookService::new(
        dispatcher,
        Duration::from_secs(config.request_timeout_secs),
    );
    // The dispatcher is fully built at this point, so the service is ready as soon as it listens
    let admin_service = AdminService::<_, WebhookError>::new(|| true);

    let webhook_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        webhook_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(webhook_task, admin_task)?;
    Ok(())
}
