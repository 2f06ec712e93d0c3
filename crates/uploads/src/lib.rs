//! Concurrent upload orchestration.
//!
//! This crate holds the business logic for sending a batch of media files to
//! the ingestion backend. It has no transport dependency: the front end
//! provides a [`TransferExecutor`] and a [`MetadataSource`] backed by the
//! HTTP client.
//!
//! # Flow
//!
//! 1. **Intake**: validate files, create Ready items
//! 2. **Assign**: pick compression and destination folder per item or for all
//! 3. **Submit**: move Ready items to Uploading and transfer them concurrently
//! 4. **Settle**: each item ends Uploaded or Error on its own

pub mod error;
pub mod executor;
pub mod folder;
pub mod intake;
pub mod metadata;
pub mod orchestrator;
pub mod store;
pub mod types;

// Re-export primary types for convenience.
pub use error::{MetadataError, StoreError, TransferFailure};
pub use executor::{ProgressSink, TransferExecutor};
pub use folder::{LatchGuard, ModifierLatch, set_folder};
pub use intake::{IntakeOutcome, intake, is_accepted_media};
pub use metadata::{MetadataSource, load_catalog};
pub use orchestrator::UploadOrchestrator;
pub use store::{Snapshot, UploadStore};
pub use types::{
    BatchSummary, FileRef, FileSource, FolderCatalog, ItemId, ItemOutcome, ItemStatus,
    SubmitReport, TransferRequest, UploadEvent, UploadItem,
};
