//! Ordered collection of upload items.
//!
//! The store is a single-writer cell: every mutation is a pure function from
//! the previous snapshot to the next one, applied atomically. Concurrent
//! transfer completions therefore never overwrite each other's updates, and
//! observers get whole snapshots through [`UploadStore::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{StoreError, TransferFailure};
use crate::types::{BatchSummary, ItemId, ItemStatus, TransferRequest, UploadItem};

/// Immutable view of the store at one point in time.
pub type Snapshot = Arc<Vec<UploadItem>>;

/// Shared, cheaply cloneable handle to the item list.
#[derive(Debug, Clone)]
pub struct UploadStore {
    cell: Arc<watch::Sender<Snapshot>>,
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (cell, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            cell: Arc::new(cell),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.cell.borrow().clone()
    }

    /// Receiver that yields a new snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.cell.subscribe()
    }

    /// Looks up a single item.
    pub fn get(&self, id: &ItemId) -> Option<UploadItem> {
        self.cell.borrow().iter().find(|i| &i.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.cell.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.borrow().is_empty()
    }

    /// Applies a transform to the current snapshot.
    ///
    /// `f` returns the next item list (`None` leaves the store untouched and
    /// wakes no observer) together with a value handed back to the caller.
    pub fn apply<R>(&self, f: impl FnOnce(&[UploadItem]) -> (Option<Vec<UploadItem>>, R)) -> R {
        let mut out = None;
        self.cell.send_if_modified(|items| {
            let (next, r) = f(items.as_slice());
            out = Some(r);
            match next {
                Some(next) => {
                    *items = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        out.expect("store transform runs exactly once")
    }

    /// Appends items, rejecting the whole batch if any id is already present.
    pub fn add(&self, new_items: Vec<UploadItem>) -> Result<(), StoreError> {
        self.apply(|items| match appended(items, new_items) {
            Ok(next) => (Some(next), Ok(())),
            Err(e) => (None, Err(e)),
        })
    }

    /// Removes a Ready or Error item.
    pub fn remove(&self, id: &ItemId) -> Result<UploadItem, StoreError> {
        self.apply(|items| match removed(items, id) {
            Ok((next, item)) => (Some(next), Ok(item)),
            Err(e) => (None, Err(e)),
        })
    }

    /// Toggles compression on a Ready item.
    pub fn set_compress(&self, id: &ItemId, compress: bool) -> Result<(), StoreError> {
        self.apply(|items| match with_compress(items, id, compress) {
            Ok(next) => (Some(next), Ok(())),
            Err(e) => (None, Err(e)),
        })
    }

    /// Moves every Ready item to Uploading(0) in one step and returns the
    /// frozen transfer requests.
    pub fn begin_uploads(&self) -> Vec<TransferRequest> {
        self.apply(|items| {
            let (next, requests) = started(items);
            if requests.is_empty() {
                (None, requests)
            } else {
                (Some(next), requests)
            }
        })
    }

    /// Records a progress percentage. Returns `true` if the store changed.
    pub fn set_progress(&self, id: &ItemId, percent: u8) -> bool {
        self.apply(|items| match with_progress(items, id, percent) {
            Some(next) => (Some(next), true),
            None => (None, false),
        })
    }

    /// Moves an Uploading item to its terminal state. Returns `false` if the
    /// item was not Uploading (already settled or removed).
    pub fn settle(&self, id: &ItemId, result: &Result<(), TransferFailure>) -> bool {
        self.apply(|items| match settled(items, id, result) {
            Some(next) => (Some(next), true),
            None => (None, false),
        })
    }

    /// Counts per state plus size-weighted completion.
    pub fn summary(&self) -> BatchSummary {
        summarize(&self.cell.borrow())
    }
}

// ---------------------------------------------------------------------------
// Pure transforms
// ---------------------------------------------------------------------------

fn position(items: &[UploadItem], id: &ItemId) -> Result<usize, StoreError> {
    items
        .iter()
        .position(|i| &i.id == id)
        .ok_or_else(|| StoreError::NotFound(id.clone()))
}

pub(crate) fn appended(
    items: &[UploadItem],
    new_items: Vec<UploadItem>,
) -> Result<Vec<UploadItem>, StoreError> {
    let mut next = items.to_vec();
    for item in new_items {
        if next.iter().any(|i| i.id == item.id) {
            return Err(StoreError::DuplicateId(item.id));
        }
        next.push(item);
    }
    Ok(next)
}

pub(crate) fn removed(
    items: &[UploadItem],
    id: &ItemId,
) -> Result<(Vec<UploadItem>, UploadItem), StoreError> {
    let idx = position(items, id)?;
    let item = &items[idx];
    match item.status {
        ItemStatus::Ready | ItemStatus::Error(_) => {}
        _ => {
            return Err(StoreError::NotRemovable {
                id: id.clone(),
                status: item.status.label(),
            });
        }
    }
    let mut next = items.to_vec();
    let item = next.remove(idx);
    Ok((next, item))
}

pub(crate) fn with_compress(
    items: &[UploadItem],
    id: &ItemId,
    compress: bool,
) -> Result<Vec<UploadItem>, StoreError> {
    let idx = position(items, id)?;
    if !items[idx].is_ready() {
        return Err(StoreError::NotReady {
            id: id.clone(),
            status: items[idx].status.label(),
        });
    }
    let mut next = items.to_vec();
    next[idx].compress = compress;
    Ok(next)
}

/// Sets `folder` on one Ready item, or on every Ready item when `broadcast`.
/// Returns the next list and how many items changed.
pub(crate) fn with_folder(
    items: &[UploadItem],
    id: &ItemId,
    folder: &str,
    broadcast: bool,
) -> Result<(Vec<UploadItem>, usize), StoreError> {
    let mut next = items.to_vec();
    if broadcast {
        let mut count = 0;
        for item in next.iter_mut().filter(|i| i.is_ready()) {
            item.folder = folder.to_string();
            count += 1;
        }
        return Ok((next, count));
    }

    let idx = position(items, id)?;
    if !items[idx].is_ready() {
        return Err(StoreError::NotReady {
            id: id.clone(),
            status: items[idx].status.label(),
        });
    }
    next[idx].folder = folder.to_string();
    Ok((next, 1))
}

pub(crate) fn started(items: &[UploadItem]) -> (Vec<UploadItem>, Vec<TransferRequest>) {
    let mut requests = Vec::new();
    let next = items
        .iter()
        .map(|item| {
            if !item.is_ready() {
                return item.clone();
            }
            requests.push(TransferRequest {
                id: item.id.clone(),
                file: item.file.clone(),
                compress: item.compress,
                folder: item.folder.clone(),
            });
            UploadItem {
                status: ItemStatus::Uploading { progress: 0 },
                ..item.clone()
            }
        })
        .collect();
    (next, requests)
}

pub(crate) fn with_progress(
    items: &[UploadItem],
    id: &ItemId,
    percent: u8,
) -> Option<Vec<UploadItem>> {
    let idx = items.iter().position(|i| &i.id == id)?;
    match items[idx].status {
        ItemStatus::Uploading { progress } if progress != percent => {
            let mut next = items.to_vec();
            next[idx].status = ItemStatus::Uploading {
                progress: percent.min(100),
            };
            Some(next)
        }
        _ => None,
    }
}

pub(crate) fn settled(
    items: &[UploadItem],
    id: &ItemId,
    result: &Result<(), TransferFailure>,
) -> Option<Vec<UploadItem>> {
    let idx = items.iter().position(|i| &i.id == id)?;
    if !matches!(items[idx].status, ItemStatus::Uploading { .. }) {
        return None;
    }
    let mut next = items.to_vec();
    next[idx].status = match result {
        Ok(()) => ItemStatus::Uploaded,
        Err(failure) => ItemStatus::Error(failure.clone()),
    };
    Some(next)
}

pub(crate) fn summarize(items: &[UploadItem]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let mut total_bytes: u128 = 0;
    let mut done_bytes: u128 = 0;

    for item in items {
        let size = u128::from(item.file.size);
        match item.status {
            ItemStatus::Ready => summary.ready += 1,
            ItemStatus::Uploading { progress } => {
                summary.uploading += 1;
                total_bytes += size;
                done_bytes += size * u128::from(progress) / 100;
            }
            ItemStatus::Uploaded => {
                summary.uploaded += 1;
                total_bytes += size;
                done_bytes += size;
            }
            ItemStatus::Error(_) => summary.failed += 1,
        }
    }

    if total_bytes > 0 {
        summary.percent = (done_bytes * 100 / total_bytes).min(100) as u8;
    }
    summary
}
