//! Delimited, paginated listings and their projection into entries.

use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::storage::{ListRequest, ObjectMeta, ObjectStore};
use crate::{Error, Result};
use super::entry::{DirectoryEntry, Entry, FileEntry};

/// Raw objects and sub-prefixes gathered from one or more listing pages.
#[derive(Debug, Default)]
pub struct Listing {
    pub items: Vec<ObjectMeta>,
    pub prefixes: Vec<String>,
}

/// Lists everything directly under `prefix`, following page tokens until
/// the backend reports no further page. A page that is exactly full is
/// therefore never mistaken for the last one.
pub async fn list_all(store: &dyn ObjectStore, prefix: &str, cancel: &CancellationToken) -> Result<Listing> {
    let mut listing = Listing::default();
    collect_pages(store, prefix, cancel, &mut listing).await?;
    Ok(listing)
}

async fn collect_pages(
    store: &dyn ObjectStore,
    prefix: &str,
    cancel: &CancellationToken,
    listing: &mut Listing,
) -> Result<()> {
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = ListRequest::new(prefix).with_page_token(token.take());
        let page = store.list_page(request, cancel).await?;
        pages += 1;

        listing.items.extend(page.items);
        listing.prefixes.extend(page.prefixes);

        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(
        "Listed {:?}: {} item(s), {} prefix(es) over {} page(s)",
        prefix,
        listing.items.len(),
        listing.prefixes.len(),
        pages
    );
    Ok(())
}

/// Best-effort listing used to populate directory views. Backend failures
/// degrade to whatever pages were already collected; only cancellation is
/// reported.
pub async fn list_entries(
    store: &dyn ObjectStore,
    directory_key: &str,
    cancel: &CancellationToken,
) -> Result<Vec<Entry>> {
    let mut listing = Listing::default();
    match collect_pages(store, directory_key, cancel, &mut listing).await {
        Ok(()) => {}
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => warn!(
            "Listing {:?} failed after {} item(s): {}",
            directory_key,
            listing.items.len() + listing.prefixes.len(),
            e
        ),
    }
    Ok(merge(directory_key, listing))
}

/// Reports whether anything at all exists under `prefix`. One page is
/// enough to answer.
pub async fn probe(store: &dyn ObjectStore, prefix: &str, cancel: &CancellationToken) -> Result<bool> {
    let page = store.list_page(ListRequest::new(prefix), cancel).await?;
    Ok(!page.items.is_empty() || !page.prefixes.is_empty())
}

fn is_self_or_marker(directory_key: &str, meta: &ObjectMeta) -> bool {
    meta.key == directory_key || meta.is_directory_marker()
}

/// Projects a raw listing of `directory_key` into entries: sub-directories
/// first, then files. The directory's own marker and prefix are dropped, as
/// are entries without a name and repeated keys.
///
/// If converting one side fails the other side is still returned; if both
/// fail the result is empty.
pub fn merge(directory_key: &str, listing: Listing) -> Vec<Entry> {
    let directories = listing
        .prefixes
        .iter()
        .filter(|p| p.as_str() != directory_key)
        .map(|p| DirectoryEntry::from_prefix(p).map(Entry::from))
        .collect::<Result<Vec<_>>>();

    let files = listing
        .items
        .iter()
        .filter(|meta| !is_self_or_marker(directory_key, meta))
        .map(|meta| FileEntry::from_meta(meta).map(Entry::from))
        .collect::<Result<Vec<_>>>();

    let merged = match (directories, files) {
        (Ok(mut directories), Ok(files)) => {
            directories.extend(files);
            directories
        }
        (Ok(directories), Err(e)) => {
            warn!("Listing {:?}: dropping files: {}", directory_key, e);
            directories
        }
        (Err(e), Ok(files)) => {
            warn!("Listing {:?}: dropping directories: {}", directory_key, e);
            files
        }
        (Err(dir_err), Err(file_err)) => {
            warn!(
                "Listing {:?} could not be merged: {}; {}",
                directory_key, dir_err, file_err
            );
            Vec::new()
        }
    };

    let mut seen = HashSet::new();
    merged
        .into_iter()
        .filter(|e| !e.name().is_empty())
        .filter(|e| seen.insert(e.full_key().to_string()))
        .collect()
}
