//! Blob content storage for rendered page artifacts. Keys are `(base_path, filename)`,
//! where `base_path` may contain several `/`-separated segments.
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid blob path: {0:?}")]
    InvalidPath(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates or overwrites the blob.
    async fn write(
        &self,
        base_path: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<(), BlobError>;

    /// Removes the blob. Removing a missing blob succeeds.
    async fn remove(&self, base_path: &str, filename: &str) -> Result<(), BlobError>;

    async fn read(&self, base_path: &str, filename: &str) -> Result<Option<Vec<u8>>, BlobError>;
}

fn validate_segment<'a>(segment: &'a str, full: &str) -> Result<&'a str, BlobError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
    {
        return Err(BlobError::InvalidPath(full.to_string()));
    }
    Ok(segment)
}

/// Splits and validates a key into its path segments.
fn key_segments<'a>(base_path: &'a str, filename: &'a str) -> Result<Vec<&'a str>, BlobError> {
    let full = format!("{base_path}/{filename}");
    let mut segments = Vec::new();
    for segment in base_path.split('/') {
        segments.push(validate_segment(segment, &full)?);
    }
    segments.push(validate_segment(filename, &full)?);
    Ok(segments)
}

pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemBlobStore { root: root.into() }
    }

    fn path(&self, base_path: &str, filename: &str) -> Result<PathBuf, BlobError> {
        let mut path = self.root.clone();
        path.extend(key_segments(base_path, filename)?);
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn write(
        &self,
        base_path: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<(), BlobError> {
        let path = self.path(base_path, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Create or overwrite file
        tokio::fs::write(&path, contents).await?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote blob");
        Ok(())
    }

    async fn remove(&self, base_path: &str, filename: &str) -> Result<(), BlobError> {
        let path = self.path(base_path, filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, base_path: &str, filename: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.path(base_path, filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local blob store keyed by `base_path/filename`.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    fn key(base_path: &str, filename: &str) -> Result<String, BlobError> {
        Ok(key_segments(base_path, filename)?.join("/"))
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(
        &self,
        base_path: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<(), BlobError> {
        let key = Self::key(base_path, filename)?;
        self.blobs.lock().insert(key, contents.to_vec());
        Ok(())
    }

    async fn remove(&self, base_path: &str, filename: &str) -> Result<(), BlobError> {
        let key = Self::key(base_path, filename)?;
        self.blobs.lock().remove(&key);
        Ok(())
    }

    async fn read(&self, base_path: &str, filename: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let key = Self::key(base_path, filename)?;
        Ok(self.blobs.lock().get(&key).cloned())
    }
}
