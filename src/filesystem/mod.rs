use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;
use crate::storage::ObjectReader;
use crate::Result;

pub mod bucket;
pub mod entry;
pub mod listing;
pub mod path;
pub mod provider;

pub use bucket::BucketFileSystem;
pub use entry::{AccessMode, DirectoryEntry, Entry, FileEntry, Permissions};
pub use provider::{AccountInfo, BucketFileSystemProvider, FileSystemProvider};

/// The hierarchical view a file-transfer session works against.
///
/// Every call re-queries the backend; nothing is cached between calls.
#[async_trait]
pub trait UnixFileSystem: Send + Sync + std::fmt::Debug {
    fn root(&self) -> &DirectoryEntry;

    fn supports_append(&self) -> bool;

    fn supports_non_empty_directory_delete(&self) -> bool;

    /// Ordering used by sessions to match entry names.
    fn compare_names(&self, a: &str, b: &str) -> Ordering {
        a.to_lowercase().cmp(&b.to_lowercase())
    }

    async fn get_entries(&self, directory: &DirectoryEntry, cancel: &CancellationToken) -> Result<Vec<Entry>>;

    async fn get_entry_by_name(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Entry>>;

    async fn create(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn create_directory(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryEntry>;

    async fn replace(&self, file: &FileEntry, data: Bytes, cancel: &CancellationToken) -> Result<()>;

    async fn append(
        &self,
        file: &FileEntry,
        start: Option<u64>,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Renames `source` (a child of `parent`) to `name` inside `target`.
    ///
    /// Not atomic: the object is copied and the source deleted afterwards,
    /// so a failure between the two steps leaves both copies in place.
    async fn move_entry(
        &self,
        parent: &DirectoryEntry,
        source: &Entry,
        target: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Entry>;

    async fn unlink(&self, entry: &Entry, cancel: &CancellationToken) -> Result<()>;

    async fn open_read(&self, file: &FileEntry, start: u64, cancel: &CancellationToken) -> Result<ObjectReader>;

    async fn set_mac_time(
        &self,
        entry: &Entry,
        modify: Option<DateTime<Utc>>,
        access: Option<DateTime<Utc>>,
        create: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<Entry>;
}
