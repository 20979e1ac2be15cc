use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::storage::ObjectMeta;
use crate::{Error, Result};
use super::path;

/// Buckets have no ownership model; every entry reports these labels.
pub const OWNER: &str = "owner";
pub const GROUP: &str = "group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessMode {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl AccessMode {
    pub const FULL: AccessMode = AccessMode { read: true, write: true, execute: true };
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub owner: AccessMode,
    pub group: AccessMode,
    pub others: AccessMode,
}

impl Permissions {
    /// Read, write and execute for every class.
    pub const FULL: Permissions = Permissions {
        owner: AccessMode::FULL,
        group: AccessMode::FULL,
        others: AccessMode::FULL,
    };
}

impl std::fmt::Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.owner, self.group, self.others)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn new(key: &str, size: u64) -> Self {
        Self {
            key: key.to_string(),
            name: path::leaf_name(key).to_string(),
            size,
            created: None,
            modified: None,
        }
    }

    /// Builds a file entry from backend metadata. Slash-terminated keys are
    /// directory-shaped and cannot be files.
    pub fn from_meta(meta: &ObjectMeta) -> Result<Self> {
        if meta.key.ends_with('/') {
            return Err(Error::InvalidData(format!(
                "object {} is directory-shaped but not a directory marker",
                meta.key
            )));
        }
        Ok(Self {
            created: meta.created,
            modified: meta.updated,
            ..Self::new(&meta.key, meta.size)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub key: String,
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    pub fn root() -> Self {
        Self::new("")
    }

    /// Directory entry for `key`, normalized to end in `/`.
    pub fn new(key: &str) -> Self {
        let key = path::directory_key(key);
        Self {
            name: path::leaf_name(&key).to_string(),
            key,
            created: None,
            modified: None,
        }
    }

    /// Builds a directory entry from a listing prefix, which must be
    /// slash-terminated.
    pub fn from_prefix(prefix: &str) -> Result<Self> {
        if !prefix.ends_with('/') {
            return Err(Error::InvalidData(format!("listing prefix {} has no trailing delimiter", prefix)));
        }
        Ok(Self::new(prefix))
    }

    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }
}

/// A node of the projected tree. Entries are rebuilt from backend
/// responses on every call and carry no identity beyond their key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl Entry {
    pub fn full_key(&self) -> &str {
        match self {
            Entry::File(f) => &f.key,
            Entry::Directory(d) => &d.key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Directory(d) => &d.name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Entry::File(f) => f.size,
            Entry::Directory(_) => 0,
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        match self {
            Entry::File(f) => f.created,
            Entry::Directory(d) => d.created,
        }
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Entry::File(f) => f.modified,
            Entry::Directory(d) => d.modified,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Entry::Directory(d) if d.is_root())
    }

    pub fn is_deletable(&self) -> bool {
        !self.is_root()
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(f) => Some(f),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntry> {
        match self {
            Entry::Directory(d) => Some(d),
            Entry::File(_) => None,
        }
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::FULL
    }

    pub fn owner(&self) -> &str {
        OWNER
    }

    pub fn group(&self) -> &str {
        GROUP
    }

    pub fn number_of_links(&self) -> u64 {
        1
    }
}

impl From<FileEntry> for Entry {
    fn from(file: FileEntry) -> Self {
        Entry::File(file)
    }
}

impl From<DirectoryEntry> for Entry {
    fn from(dir: DirectoryEntry) -> Self {
        Entry::Directory(dir)
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_directory() { 'd' } else { '-' };
        let modified = self
            .modified()
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}{} {} {} {} {:>12} {} {}",
            kind,
            self.permissions(),
            self.number_of_links(),
            self.owner(),
            self.group(),
            self.size(),
            modified,
            self.name()
        )
    }
}
