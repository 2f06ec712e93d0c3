//! Startup folder metadata with graceful degradation.

use std::future::Future;
use std::pin::Pin;

use titanic_protocol::constants::FALLBACK_FOLDER;
use tracing::{info, warn};

use crate::error::MetadataError;
use crate::types::FolderCatalog;

/// Source of the folder list and server default folder.
pub trait MetadataSource: Send + Sync {
    /// Ordered list of destination folders.
    fn folders(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, MetadataError>> + Send + '_>>;

    /// Server-configured default folder, `None` if unset.
    fn default_folder(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, MetadataError>> + Send + '_>>;
}

/// Fetches the folder catalog once.
///
/// Never fails: an unreachable service yields an empty folder list and
/// the fallback default folder.
pub async fn load_catalog(source: &dyn MetadataSource) -> FolderCatalog {
    let (folders, default_folder) = tokio::join!(source.folders(), source.default_folder());

    let folders = folders.unwrap_or_else(|e| {
        warn!(error = %e, "folder list unavailable, continuing without it");
        Vec::new()
    });

    let default_folder = match default_folder {
        Ok(Some(name)) if !name.trim().is_empty() => name,
        Ok(_) => FALLBACK_FOLDER.to_string(),
        Err(e) => {
            warn!(error = %e, fallback = FALLBACK_FOLDER, "default folder unavailable");
            FALLBACK_FOLDER.to_string()
        }
    };

    info!(folders = folders.len(), default_folder = %default_folder, "folder catalog loaded");
    FolderCatalog {
        folders,
        default_folder,
    }
}
