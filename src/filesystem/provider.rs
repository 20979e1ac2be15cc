use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use crate::config::Config;
use crate::storage::{ObjectStore, S3ObjectStore};
use crate::Result;
use super::{BucketFileSystem, UnixFileSystem};

/// The authenticated account a session runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: String,
}

impl AccountInfo {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

/// Hands each session its own filesystem view.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    async fn create(&self, account: &AccountInfo) -> Result<Arc<dyn UnixFileSystem>>;
}

/// Every account sees the same configured bucket through one shared client.
#[derive(Debug, Clone)]
pub struct BucketFileSystemProvider {
    store: Arc<dyn ObjectStore>,
}

impl BucketFileSystemProvider {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = S3ObjectStore::from_config(config).await?;
        info!("Serving {}", store);
        Ok(Self::new(Arc::new(store)))
    }
}

#[async_trait]
impl FileSystemProvider for BucketFileSystemProvider {
    async fn create(&self, account: &AccountInfo) -> Result<Arc<dyn UnixFileSystem>> {
        info!("Opening bucket {} for {}", self.store.bucket(), account.name);
        Ok(Arc::new(BucketFileSystem::new(self.store.clone())))
    }
}
