//! Data types shared by the upload core.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;

use crate::error::TransferFailure;

/// Opaque, unique identifier of an upload item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a file's bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// A file on local disk, streamed at transfer time.
    Path(PathBuf),
    /// Bytes already held in memory.
    Memory(Bytes),
}

/// Handle to a file's bytes plus its name and platform-reported mime type.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRef {
    pub name: String,
    /// Mime type as classified by the platform; may be empty.
    pub mime: String,
    pub size: u64,
    pub source: FileSource,
}

impl FileRef {
    /// Builds a handle for a file on disk, reading its size.
    pub fn from_path(path: impl Into<PathBuf>, mime: impl Into<String>) -> std::io::Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime: mime.into(),
            size,
            source: FileSource::Path(path),
        })
    }

    /// Builds a handle for in-memory bytes.
    pub fn in_memory(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime: mime.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Lifecycle state of an upload item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Ready,
    /// Transfer in flight; `progress` is the latest percentage reported.
    Uploading { progress: u8 },
    Uploaded,
    Error(TransferFailure),
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Ready => "ready",
            ItemStatus::Uploading { .. } => "uploading",
            ItemStatus::Uploaded => "uploaded",
            ItemStatus::Error(_) => "error",
        }
    }
}

/// One tracked file transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub id: ItemId,
    pub file: FileRef,
    pub status: ItemStatus,
    pub compress: bool,
    pub folder: String,
}

impl UploadItem {
    /// A fresh Ready item with default options.
    pub fn new(file: FileRef, folder: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            file,
            status: ItemStatus::Ready,
            compress: true,
            folder: folder.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, ItemStatus::Ready)
    }

    /// Latest progress percentage; only present while uploading.
    pub fn progress_percent(&self) -> Option<u8> {
        match self.status {
            ItemStatus::Uploading { progress } => Some(progress),
            _ => None,
        }
    }

    /// Human-readable failure text; present iff the item is in `Error`.
    pub fn error_detail(&self) -> Option<String> {
        match &self.status {
            ItemStatus::Error(failure) => Some(failure.user_message()),
            _ => None,
        }
    }
}

/// Everything a transfer needs, frozen at the moment `submit()` picked the item.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub id: ItemId,
    pub file: FileRef,
    pub compress: bool,
    pub folder: String,
}

/// Progress notification emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Item moved to Uploading.
    Started { id: ItemId, name: String },
    /// New progress percentage for an uploading item.
    Progress { id: ItemId, percent: u8 },
    /// Transfer finished successfully.
    Uploaded { id: ItemId, name: String },
    /// Transfer failed; `error` is the user-facing message.
    Failed {
        id: ItemId,
        name: String,
        error: String,
    },
}

/// Result of one transfer launched by `submit()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub id: ItemId,
    pub name: String,
    pub result: Result<(), TransferFailure>,
}

/// Per-item results of a `submit()` call, in launch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl SubmitReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Aggregate view of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub ready: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
    /// Size-weighted completion of uploading and uploaded items, 0–100.
    pub percent: u8,
}

/// Folder list and default folder fetched at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCatalog {
    pub folders: Vec<String>,
    pub default_folder: String,
}

impl Default for FolderCatalog {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            default_folder: titanic_protocol::constants::FALLBACK_FOLDER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn extension_lowercased() {
        let f = FileRef::in_memory("Clip.MKV", "", vec![1u8]);
        assert_eq!(f.extension().as_deref(), Some("mkv"));

        let f = FileRef::in_memory(".hidden", "", vec![]);
        assert_eq!(f.extension(), None);

        let f = FileRef::in_memory("noext", "", vec![]);
        assert_eq!(f.extension(), None);
    }

    #[test]
    fn from_path_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp4");
        std::fs::write(&path, b"0123456789").unwrap();

        let f = FileRef::from_path(&path, "video/mp4").unwrap();
        assert_eq!(f.name, "a.mp4");
        assert_eq!(f.size, 10);
        assert_eq!(f.source, FileSource::Path(path));
    }

    #[test]
    fn progress_and_error_detail_follow_status() {
        let mut item = UploadItem::new(FileRef::in_memory("a.mp4", "video/mp4", vec![0u8]), "Clips");
        assert!(item.is_ready());
        assert!(item.compress);
        assert_eq!(item.progress_percent(), None);
        assert_eq!(item.error_detail(), None);

        item.status = ItemStatus::Uploading { progress: 40 };
        assert_eq!(item.progress_percent(), Some(40));

        item.status = ItemStatus::Error(TransferFailure::Auth);
        assert_eq!(item.progress_percent(), None);
        assert!(item.error_detail().is_some());
    }

    #[test]
    fn report_counts() {
        let report = SubmitReport {
            outcomes: vec![
                ItemOutcome {
                    id: "a".into(),
                    name: "a.mp4".into(),
                    result: Ok(()),
                },
                ItemOutcome {
                    id: "b".into(),
                    name: "b.mp4".into(),
                    result: Err(TransferFailure::Auth),
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_empty());
    }
}
