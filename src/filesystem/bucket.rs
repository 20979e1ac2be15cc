use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::error::DeleteFailure;
use crate::storage::{ObjectReader, ObjectStore, DIRECTORY_CONTENT_TYPE};
use crate::{Error, Result};
use super::entry::{DirectoryEntry, Entry, FileEntry};
use super::{listing, path, UnixFileSystem};

/// Projects one bucket of an object store as a Unix-style tree.
///
/// Directories exist either as zero-length marker objects (`key/` with the
/// directory content type) or implicitly as a prefix of some other key.
#[derive(Debug, Clone)]
pub struct BucketFileSystem {
    store: Arc<dyn ObjectStore>,
    root: DirectoryEntry,
}

impl BucketFileSystem {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            root: DirectoryEntry::root(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn valid_child_key(directory: &DirectoryEntry, name: &str) -> Result<String> {
        let key = path::child_key(&directory.key, name);
        if path::leaf_name(&key).is_empty() {
            return Err(Error::InvalidData(format!("invalid entry name {:?}", name)));
        }
        Ok(key)
    }

    /// Deletes `directory` and everything below it.
    ///
    /// Directories are visited depth-first; files are deleted as they are
    /// found and the directory markers last, deepest first. Individual
    /// failures do not stop the traversal and are reported together.
    async fn delete_tree(&self, directory: &DirectoryEntry, cancel: &CancellationToken) -> Result<()> {
        let mut visited: Vec<DirectoryEntry> = Vec::new();
        let mut failures: Vec<DeleteFailure> = Vec::new();
        let mut pending = vec![directory.clone()];

        while let Some(current) = pending.pop() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let raw = match listing::list_all(self.store.as_ref(), &current.key, cancel).await {
                Ok(raw) => raw,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!("Cannot list {} for deletion: {}", current.key, e);
                    // Its marker stays: the children below it were never enumerated.
                    failures.push(DeleteFailure { key: current.key.clone(), reason: e.to_string() });
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in listing::merge(&current.key, raw) {
                match entry {
                    Entry::File(file) => {
                        let deleted = self.store.delete_object(&file.key, cancel).await;
                        match deleted {
                            Ok(()) => debug!("Deleted {}", file.key),
                            Err(Error::Cancelled) => return Err(Error::Cancelled),
                            Err(e) => {
                                warn!("Cannot delete {}: {}", file.key, e);
                                failures.push(DeleteFailure { key: file.key, reason: e.to_string() });
                            }
                        }
                    }
                    Entry::Directory(dir) => subdirectories.push(dir),
                }
            }

            visited.push(current);
            // Reversed so the first sub-directory is popped (visited) first.
            pending.extend(subdirectories.into_iter().rev());
        }

        for dir in visited.iter().rev() {
            match self.store.delete_object(&dir.key, cancel).await {
                Ok(()) => debug!("Deleted directory marker {}", dir.key),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!("Cannot delete directory marker {}: {}", dir.key, e);
                    failures.push(DeleteFailure { key: dir.key.clone(), reason: e.to_string() });
                }
            }
        }

        if failures.is_empty() {
            info!("Deleted directory tree {} ({} directories)", directory.key, visited.len());
            Ok(())
        } else {
            Err(Error::PartialDelete {
                key: directory.key.clone(),
                failures,
            })
        }
    }
}

#[async_trait]
impl UnixFileSystem for BucketFileSystem {
    fn root(&self) -> &DirectoryEntry {
        &self.root
    }

    fn supports_append(&self) -> bool {
        false
    }

    fn supports_non_empty_directory_delete(&self) -> bool {
        true
    }

    async fn get_entries(&self, directory: &DirectoryEntry, cancel: &CancellationToken) -> Result<Vec<Entry>> {
        listing::list_entries(self.store.as_ref(), &directory.key, cancel).await
    }

    async fn get_entry_by_name(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Entry>> {
        let key = path::child_key(&directory.key, name);
        if path::leaf_name(&key).is_empty() {
            return Ok(None);
        }

        if let Some(meta) = self.store.head_object(&key, cancel).await? {
            if !meta.is_directory_marker() {
                return Ok(Some(Entry::File(FileEntry::from_meta(&meta)?)));
            }
        }

        let child = DirectoryEntry::new(&key);
        if listing::probe(self.store.as_ref(), &child.key, cancel).await? {
            Ok(Some(Entry::Directory(child)))
        } else {
            Ok(None)
        }
    }

    async fn create(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let key = Self::valid_child_key(directory, name)?;
        let size = data.len();
        self.store.put_object(&key, data, None, cancel).await?;
        info!("Created {} ({} bytes)", key, size);
        Ok(())
    }

    async fn create_directory(
        &self,
        directory: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryEntry> {
        let key = path::directory_key(&Self::valid_child_key(directory, name)?);
        self.store
            .put_object(&key, Bytes::new(), Some(DIRECTORY_CONTENT_TYPE), cancel)
            .await?;
        info!("Created directory {}", key);
        Ok(DirectoryEntry::new(&key))
    }

    async fn replace(&self, file: &FileEntry, data: Bytes, cancel: &CancellationToken) -> Result<()> {
        let size = data.len();
        self.store.put_object(&file.key, data, None, cancel).await?;
        info!("Replaced {} ({} bytes)", file.key, size);
        Ok(())
    }

    async fn append(
        &self,
        _file: &FileEntry,
        _start: Option<u64>,
        _data: Bytes,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::Unsupported("append"))
    }

    async fn move_entry(
        &self,
        parent: &DirectoryEntry,
        source: &Entry,
        target: &DirectoryEntry,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Entry> {
        let file = match source {
            Entry::File(file) => file,
            Entry::Directory(_) => return Err(Error::Unsupported("directory move")),
        };

        let source_key = Self::valid_child_key(parent, &file.name)?;
        let target_key = Self::valid_child_key(target, name)?;

        if source_key == target_key {
            debug!("Move of {} onto itself, nothing to do", source_key);
            return Ok(Entry::File(file.clone()));
        }

        self.store.copy_object(&source_key, &target_key, cancel).await?;

        if let Err(e) = self.store.delete_object(&source_key, cancel).await {
            warn!(
                "Copied {} to {} but could not remove the source: {}",
                source_key, target_key, e
            );
            return Err(e);
        }

        info!("Moved {} to {}", source_key, target_key);
        Ok(Entry::File(FileEntry {
            created: file.created,
            modified: file.modified,
            ..FileEntry::new(&target_key, file.size)
        }))
    }

    async fn unlink(&self, entry: &Entry, cancel: &CancellationToken) -> Result<()> {
        match entry {
            Entry::File(file) => {
                self.store.delete_object(&file.key, cancel).await?;
                info!("Deleted {}", file.key);
                Ok(())
            }
            Entry::Directory(dir) if dir.is_root() => Err(Error::Unsupported("deleting the root directory")),
            Entry::Directory(dir) => self.delete_tree(dir, cancel).await,
        }
    }

    async fn open_read(&self, file: &FileEntry, start: u64, cancel: &CancellationToken) -> Result<ObjectReader> {
        self.store.open_read(&file.key, start, cancel).await
    }

    async fn set_mac_time(
        &self,
        _entry: &Entry,
        _modify: Option<DateTime<Utc>>,
        _access: Option<DateTime<Utc>>,
        _create: Option<DateTime<Utc>>,
        _cancel: &CancellationToken,
    ) -> Result<Entry> {
        Err(Error::Unsupported("setting timestamps"))
    }
}
