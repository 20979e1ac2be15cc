use async_trait::async_trait;
use bucketfs::storage::{ListPage, ListRequest, MemoryObjectStore, ObjectMeta, ObjectReader, ObjectStore};
use bucketfs::{Error, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Memory store that can be told to fail specific calls and that records
/// the order in which keys were deleted.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryObjectStore,
    fail_copy: AtomicBool,
    fail_put: AtomicBool,
    fail_head: AtomicBool,
    fail_list_from_page: AtomicUsize,
    list_calls: AtomicUsize,
    fail_delete: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new("faulty"),
            fail_list_from_page: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    pub fn fail_copies(&self) {
        self.fail_copy.store(true, Ordering::SeqCst);
    }

    pub fn fail_puts(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub fn fail_heads(&self) {
        self.fail_head.store(true, Ordering::SeqCst);
    }

    /// Fails every listing call from the `page`-th call on (1-based).
    pub fn fail_listing_from_call(&self, page: usize) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.fail_list_from_page.store(page, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub async fn seed(&self, key: &str, data: &'static [u8]) {
        let content_type = key.ends_with('/').then_some(bucketfs::storage::DIRECTORY_CONTENT_TYPE);
        self.inner
            .put_object(key, Bytes::from_static(data), content_type, &CancellationToken::new())
            .await
            .unwrap();
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn head_object(&self, key: &str, cancel: &CancellationToken) -> Result<Option<ObjectMeta>> {
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(Error::backend(key, "injected head failure"));
        }
        self.inner.head_object(key, cancel).await
    }

    async fn list_page(&self, request: ListRequest, cancel: &CancellationToken) -> Result<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_list_from_page.load(Ordering::SeqCst) {
            return Err(Error::backend(&request.prefix, "injected listing failure"));
        }
        self.inner.list_page(request, cancel).await
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Error::backend(key, "injected put failure"));
        }
        self.inner.put_object(key, data, content_type, cancel).await
    }

    async fn copy_object(&self, source: &str, dest: &str, cancel: &CancellationToken) -> Result<()> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(Error::backend(source, "injected copy failure"));
        }
        self.inner.copy_object(source, dest, cancel).await
    }

    async fn delete_object(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(Error::backend(key, "injected delete failure"));
        }
        self.inner.delete_object(key, cancel).await?;
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn open_read(&self, key: &str, offset: u64, cancel: &CancellationToken) -> Result<ObjectReader> {
        self.inner.open_read(key, offset, cancel).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}
