//! In-process object store.
//!
//! Keeps objects in a sorted map and reproduces the delimiter, prefix and
//! pagination behaviour of a real bucket listing, so the filesystem adapter
//! can be exercised without network access.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use crate::{Error, Result};
use super::{ListPage, ListRequest, ObjectMeta, ObjectReader, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.data.len() as u64,
            content_type: self.content_type.clone(),
            created: Some(self.created),
            updated: Some(self.updated),
        }
    }
}

/// A listing result slot: either a concrete object or a rolled-up prefix.
enum Slot {
    Item(ObjectMeta),
    Prefix(String),
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// All keys currently stored, in lexicographic order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head_object(&self, key: &str, cancel: &CancellationToken) -> Result<Option<ObjectMeta>> {
        check(cancel)?;
        Ok(self.objects.read().await.get(key).map(|o| o.meta(key)))
    }

    async fn list_page(&self, request: ListRequest, cancel: &CancellationToken) -> Result<ListPage> {
        check(cancel)?;
        debug!("memory list {:?} (token: {:?})", request.prefix, request.page_token);

        let objects = self.objects.read().await;
        let page_size = request.page_size.max(1) as usize;
        let lower = match &request.page_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut slots: Vec<(String, Slot)> = Vec::new();
        let mut has_more = false;

        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                break;
            }
            // A token that names a rolled-up prefix covers every key below it.
            // The listed prefix itself is only ever an item (its own marker).
            if let Some(token) = &request.page_token {
                let rolled_up = !request.delimiter.is_empty()
                    && token != &request.prefix
                    && token.ends_with(&request.delimiter);
                if rolled_up && key.starts_with(token.as_str()) {
                    continue;
                }
            }

            let rest = &key[request.prefix.len()..];
            let slot = match rest.find(&request.delimiter) {
                Some(idx) if !request.delimiter.is_empty() => {
                    let prefix = format!("{}{}", request.prefix, &rest[..idx + request.delimiter.len()]);
                    if slots.last().map(|(k, _)| k == &prefix).unwrap_or(false) {
                        continue;
                    }
                    (prefix.clone(), Slot::Prefix(prefix))
                }
                _ => (key.clone(), Slot::Item(object.meta(key))),
            };

            if slots.len() == page_size {
                has_more = true;
                break;
            }
            slots.push(slot);
        }

        let next_page_token = if has_more {
            slots.last().map(|(k, _)| k.clone())
        } else {
            None
        };

        let mut page = ListPage {
            next_page_token,
            ..ListPage::default()
        };
        for (_, slot) in slots {
            match slot {
                Slot::Item(meta) => page.items.push(meta),
                Slot::Prefix(prefix) => page.prefixes.push(prefix),
            }
        }
        Ok(page)
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check(cancel)?;
        let now = Utc::now();
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
                created: now,
                updated: now,
            },
        );
        Ok(())
    }

    async fn copy_object(&self, source: &str, dest: &str, cancel: &CancellationToken) -> Result<()> {
        check(cancel)?;
        let mut objects = self.objects.write().await;
        let mut copy = objects
            .get(source)
            .cloned()
            .ok_or_else(|| Error::NotFound(source.to_string()))?;
        let now = Utc::now();
        copy.created = now;
        copy.updated = now;
        objects.insert(dest.to_string(), copy);
        Ok(())
    }

    async fn delete_object(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        check(cancel)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn open_read(&self, key: &str, offset: u64, cancel: &CancellationToken) -> Result<ObjectReader> {
        check(cancel)?;
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        Ok(Box::pin(std::io::Cursor::new(data.slice(start..))))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
