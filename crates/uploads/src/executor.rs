//! Transfer executor trait.
//!
//! `TransferExecutor` is implemented by the front end on top of the HTTP
//! client. Keeping it a trait leaves the orchestrator free of transport
//! details and testable with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransferFailure;
use crate::types::TransferRequest;

/// Synchronous progress callback: `(sent_bytes, total_bytes)`.
pub type ProgressSink = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Performs one authenticated multipart transfer.
pub trait TransferExecutor: Send + Sync {
    /// Uploads `request.file` with the frozen `compress` / `folder` values.
    ///
    /// Implementations call `progress` zero or more times with
    /// non-decreasing byte counts and never touch the item store.
    fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferFailure>> + Send + '_>>;
}

/// Integer percentage of `sent` over `total`, clamped to 0–100.
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let sent = u128::from(sent.min(total));
    (sent * 100 / u128::from(total)) as u8
}
