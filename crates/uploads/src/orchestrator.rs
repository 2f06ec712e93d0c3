//! Upload orchestrator for concurrent, independent transfers.
//!
//! Picks every Ready item, launches one transfer per item, feeds progress
//! back into the store and emits events for the notification layer.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::TransferFailure;
use crate::executor::{ProgressSink, TransferExecutor, percent};
use crate::store::UploadStore;
use crate::types::{ItemId, ItemOutcome, SubmitReport, TransferRequest, UploadEvent};

/// Drives transfers for the items in an [`UploadStore`].
pub struct UploadOrchestrator {
    store: UploadStore,
    executor: Arc<dyn TransferExecutor>,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator over `store` using `executor` for transfers.
    pub fn new(store: UploadStore, executor: Arc<dyn TransferExecutor>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            executor,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Uploads every item that is Ready right now.
    ///
    /// All selected items are marked Uploading before the first transfer
    /// starts, so a second call made meanwhile finds nothing to do. Each
    /// transfer runs on its own task and keeps going even if this future is
    /// dropped. Awaiting resolves after every launched transfer has settled;
    /// one failure never stops the others.
    pub async fn submit(&self) -> SubmitReport {
        let requests = self.store.begin_uploads();
        if requests.is_empty() {
            debug!("submit: nothing ready");
            return SubmitReport::default();
        }

        info!(count = requests.len(), "starting uploads");

        let mut launched = Vec::with_capacity(requests.len());
        for request in requests {
            let id = request.id.clone();
            let name = request.file.name.clone();
            let _ = self.events_tx.send(UploadEvent::Started {
                id: id.clone(),
                name: name.clone(),
            });

            let handle = tokio::spawn(run_transfer(
                self.store.clone(),
                self.executor.clone(),
                self.events_tx.clone(),
                request,
            ));
            launched.push((id, name, handle));
        }

        let settled = join_all(launched.into_iter().map(|(id, name, handle)| async move {
            (id, name, handle.await)
        }))
        .await;

        let outcomes = settled
            .into_iter()
            .map(|(id, name, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let failure = TransferFailure::Unknown(format!("transfer task ended: {e}"));
                    finish(&self.store, &self.events_tx, id, name, Err(failure))
                }
            })
            .collect::<Vec<_>>();

        let report = SubmitReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "uploads settled"
        );
        report
    }
}

async fn run_transfer(
    store: UploadStore,
    executor: Arc<dyn TransferExecutor>,
    events: mpsc::UnboundedSender<UploadEvent>,
    request: TransferRequest,
) -> ItemOutcome {
    let id = request.id.clone();
    let name = request.file.name.clone();
    debug!(
        item = %id,
        name = %name,
        folder = %request.folder,
        compress = request.compress,
        "transfer starting"
    );

    let sink: ProgressSink = {
        let store = store.clone();
        let events = events.clone();
        let id = id.clone();
        Arc::new(move |sent, total| {
            let pct = percent(sent, total);
            if store.set_progress(&id, pct) {
                let _ = events.send(UploadEvent::Progress {
                    id: id.clone(),
                    percent: pct,
                });
            }
        })
    };

    // A panicking executor still settles its item, whether or not anyone is
    // awaiting `submit()`.
    let result = match AssertUnwindSafe(executor.transfer(request, sink))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            error!(item = %id, name = %name, reason, "transfer panicked");
            Err(TransferFailure::Unknown(format!("transfer panicked: {reason}")))
        }
    };
    finish(&store, &events, id, name, result)
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Applies the terminal state for one item and reports it.
fn finish(
    store: &UploadStore,
    events: &mpsc::UnboundedSender<UploadEvent>,
    id: ItemId,
    name: String,
    result: Result<(), TransferFailure>,
) -> ItemOutcome {
    if !store.settle(&id, &result) {
        warn!(item = %id, "item was no longer uploading when its transfer settled");
    }

    let event = match &result {
        Ok(()) => {
            info!(item = %id, name = %name, "upload completed");
            UploadEvent::Uploaded {
                id: id.clone(),
                name: name.clone(),
            }
        }
        Err(failure) => {
            error!(item = %id, name = %name, error = %failure, "upload failed");
            UploadEvent::Failed {
                id: id.clone(),
                name: name.clone(),
                error: failure.user_message(),
            }
        }
    };
    let _ = events.send(event);

    ItemOutcome { id, name, result }
}
