//! Error types for the upload core.

use crate::types::ItemId;

/// Fixed message shown when a transfer fails because nobody is signed in.
pub const AUTH_MESSAGE: &str = "You must be signed in to upload.";

/// Shown when the request never completed.
pub const NETWORK_MESSAGE: &str = "Network error: the server could not be reached";

/// Shown when nothing more specific is known.
pub const UNKNOWN_MESSAGE: &str = "Upload failed for an unknown reason";

/// Errors from store mutations requested by the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no upload item with id {0}")]
    NotFound(ItemId),

    #[error("item {id} is {status} and can no longer be edited")]
    NotReady { id: ItemId, status: &'static str },

    #[error("item {id} is {status} and cannot be removed")]
    NotRemovable { id: ItemId, status: &'static str },

    #[error("duplicate item id {0}")]
    DuplicateId(ItemId),
}

/// Why a single transfer did not succeed.
///
/// Every variant is scoped to one item; none of them is fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferFailure {
    #[error("not signed in")]
    Auth,

    #[error("HTTP {status}")]
    Http {
        status: u16,
        server_message: Option<String>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl TransferFailure {
    /// Human-readable text for the item's error detail and notifications.
    ///
    /// The server's `error` field is used verbatim when present.
    pub fn user_message(&self) -> String {
        match self {
            TransferFailure::Auth => AUTH_MESSAGE.to_string(),
            TransferFailure::Http {
                server_message: Some(msg),
                ..
            } => msg.clone(),
            TransferFailure::Http { status, .. } => format!("Upload failed (HTTP {status})"),
            TransferFailure::Network(_) => NETWORK_MESSAGE.to_string(),
            TransferFailure::Unknown(_) => UNKNOWN_MESSAGE.to_string(),
        }
    }
}

/// The metadata service could not be queried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("metadata unavailable: {0}")]
pub struct MetadataError(pub String);
