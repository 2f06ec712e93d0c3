//! Destination folder assignment for pending items.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::StoreError;
use crate::store::{UploadStore, with_folder};
use crate::types::ItemId;

/// Sets the destination folder of one Ready item, or of every Ready item
/// when `broadcast` is true.
///
/// Returns how many items were changed. Items that are uploading or already
/// settled keep the folder they were submitted with.
pub fn set_folder(
    store: &UploadStore,
    item_id: &ItemId,
    folder: &str,
    broadcast: bool,
) -> Result<usize, StoreError> {
    let changed = store.apply(|items| match with_folder(items, item_id, folder, broadcast) {
        Ok((_, 0)) => (None, Ok(0)),
        Ok((next, count)) => (Some(next), Ok(count)),
        Err(e) => (None, Err(e)),
    })?;
    debug!(item = %item_id, folder, broadcast, changed, "folder assigned");
    Ok(changed)
}

/// Tracks whether the broadcast modifier key is currently held.
///
/// Owned by the input layer: it observes key-down / key-up while a
/// [`LatchGuard`] is alive and samples [`is_held`](Self::is_held) to pass an
/// explicit `broadcast` flag into [`set_folder`].
#[derive(Debug, Clone, Default)]
pub struct ModifierLatch {
    held: Arc<AtomicBool>,
}

impl ModifierLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts observing key events. The latch resets when the guard drops.
    pub fn attach(&self) -> LatchGuard {
        LatchGuard {
            held: self.held.clone(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Registration of a key observer on a [`ModifierLatch`].
#[derive(Debug)]
pub struct LatchGuard {
    held: Arc<AtomicBool>,
}

impl LatchGuard {
    pub fn key_down(&self) {
        self.held.store(true, Ordering::Release);
    }

    pub fn key_up(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
