use crate::entry::DecodeError;
use crate::flatten::MissingRequiredField;
use stores::blob::BlobError;
use stores::catalog::CatalogError;
use stores::store_directory::StoreDirectoryError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for webhook operations
pub type Result<T, E = WebhookError> = std::result::Result<T, E>;

/// Errors that can occur while handling a webhook
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    MissingField(#[from] MissingRequiredField),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Store directory error: {0}")]
    StoreDirectory(#[from] StoreDirectoryError),

    #[error("Failed to serialize front-matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
