//! File intake: validation and item creation.

use tracing::{debug, warn};

use crate::store::UploadStore;
use crate::types::{FileRef, ItemId, UploadItem};

/// Containers that platforms often report with an empty or generic mime type.
const CONTAINER_EXTENSIONS: &[&str] = &[
    "mkv", "ts", "m2ts", "mts", "flv", "wmv", "avi", "m4v", "webm", "mov", "mp4",
];

/// Whether a file is accepted as media: a `video/*` mime type or a known
/// container extension.
pub fn is_accepted_media(file: &FileRef) -> bool {
    if file.mime.to_ascii_lowercase().starts_with("video/") {
        return true;
    }
    file.extension()
        .is_some_and(|ext| CONTAINER_EXTENSIONS.contains(&ext.as_str()))
}

/// Result of one intake call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakeOutcome {
    /// Ids of the created items, in input order.
    pub accepted: Vec<ItemId>,
    /// Names of the files that failed validation.
    pub rejected: Vec<String>,
}

impl IntakeOutcome {
    /// A single aggregated warning for all rejected files, if any.
    pub fn rejection_notice(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(format!(
            "{} file(s) skipped (not a video): {}",
            self.rejected.len(),
            self.rejected.join(", ")
        ))
    }
}

/// Validates `files` and adds one Ready item per accepted file.
///
/// New items get `compress = true` and `default_folder`.
pub fn intake(store: &UploadStore, files: Vec<FileRef>, default_folder: &str) -> IntakeOutcome {
    let mut outcome = IntakeOutcome::default();
    let mut items = Vec::new();

    for file in files {
        if is_accepted_media(&file) {
            let item = UploadItem::new(file, default_folder);
            debug!(item = %item.id, name = %item.file.name, size = item.file.size, "accepted file");
            outcome.accepted.push(item.id.clone());
            items.push(item);
        } else {
            outcome.rejected.push(file.name);
        }
    }

    if !outcome.rejected.is_empty() {
        warn!(count = outcome.rejected.len(), "rejected non-media files");
    }

    if !items.is_empty() {
        // Ids are freshly generated, so a collision here means a broken id source.
        if let Err(e) = store.add(items) {
            warn!(error = %e, "failed to add accepted files");
            outcome.accepted.clear();
        }
    }

    outcome
}
