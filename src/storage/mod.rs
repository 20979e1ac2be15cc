use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use crate::{Error, Result};

pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Content type of the zero-length objects that stand in for directories.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// Hierarchy delimiter used for every listing call.
pub const DELIMITER: &str = "/";

/// Number of keys requested per listing page.
pub const PAGE_SIZE: i32 = 1000;

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn is_directory_marker(&self) -> bool {
        self.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: String,
    pub page_size: i32,
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            delimiter: DELIMITER.to_string(),
            page_size: PAGE_SIZE,
            page_token: None,
        }
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of a delimited listing: objects directly under the prefix and
/// the immediate virtual sub-prefixes.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<ObjectMeta>,
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

/// The object-storage client consumed by the filesystem adapter.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Metadata of the object stored at exactly `key`, or `None` if absent.
    async fn head_object(&self, key: &str, cancel: &CancellationToken) -> Result<Option<ObjectMeta>>;
    async fn list_page(&self, request: ListRequest, cancel: &CancellationToken) -> Result<ListPage>;
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()>;
    async fn copy_object(&self, source: &str, dest: &str, cancel: &CancellationToken) -> Result<()>;
    async fn delete_object(&self, key: &str, cancel: &CancellationToken) -> Result<()>;
    /// Reader over the object's bytes from `offset` on. An offset at or past
    /// the end yields an empty reader.
    async fn open_read(&self, key: &str, offset: u64, cancel: &CancellationToken) -> Result<ObjectReader>;
    fn bucket(&self) -> &str;
}

/// Races a backend call against the cancellation signal.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
