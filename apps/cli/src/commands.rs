//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use titanic_client::{Client, Error as ClientError};
use titanic_notify::{Notice, NoticeBoard, Severity};
use titanic_protocol::SpaceInfo;
use titanic_uploads::{
    FileRef, ItemStatus, UploadEvent, UploadOrchestrator, UploadStore, intake, load_catalog,
    set_folder,
};

use crate::adapter::{HttpExecutor, HttpMetadata};

/// Options for one `upload` run.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub files: Vec<PathBuf>,
    pub folder: Option<String>,
    pub compress: bool,
}

/// Uploads the given files. Returns `true` when no item ended in error.
pub async fn upload(client: Arc<Client>, opts: UploadOptions) -> anyhow::Result<bool> {
    let mut board = NoticeBoard::new();

    let catalog = load_catalog(&HttpMetadata::new(client.clone())).await;

    let mut files = Vec::with_capacity(opts.files.len());
    for path in &opts.files {
        let mime = mime_guess::from_path(path).first_raw().unwrap_or_default();
        match FileRef::from_path(path, mime) {
            Ok(file) => files.push(file),
            Err(e) => {
                let id = board.push(
                    Severity::Warning,
                    format!("Cannot read {}", path.display()),
                    Some(e.to_string()),
                );
                show(&board, id);
            }
        }
    }

    let store = UploadStore::new();
    let outcome = intake(&store, files, &catalog.default_folder);
    if let Some(id) = board.record_intake(&outcome) {
        show(&board, id);
    }
    let Some(first) = outcome.accepted.first() else {
        anyhow::bail!("no video files to upload");
    };

    if let Some(folder) = opts.folder.as_deref() {
        if !catalog.folders.is_empty() && !catalog.folders.iter().any(|f| f == folder) {
            warn!(folder, "folder is not in the server's list");
        }
        set_folder(&store, first, folder, true)?;
    }
    if !opts.compress {
        for id in &outcome.accepted {
            store.set_compress(id, false)?;
        }
    }

    let needed: u64 = store
        .snapshot()
        .iter()
        .filter(|item| item.is_ready())
        .map(|item| item.file.size)
        .sum();

    let mut orchestrator =
        UploadOrchestrator::new(store.clone(), Arc::new(HttpExecutor::new(client.clone())));
    let events = orchestrator
        .take_events()
        .context("event receiver already taken")?;

    let space_client = client.clone();
    let space = tokio::spawn(async move { space_client.space().await });
    let forwarder = tokio::spawn(forward_events(events, space, needed, board));

    let report = orchestrator.submit().await;
    // Closes the event channel so the forwarder can finish.
    drop(orchestrator);
    let mut board = forwarder.await?;

    if let Some(id) = board.record_report(&report) {
        show(&board, id);
    }

    let summary = store.summary();
    println!(
        "{} uploaded, {} failed ({}%)",
        summary.uploaded, summary.failed, summary.percent
    );
    for item in store.snapshot().iter() {
        if let ItemStatus::Error(_) = item.status {
            let detail = item.error_detail().unwrap_or_default();
            println!("  {} [{}]: {detail}", item.file.name, item.folder);
        }
    }

    Ok(summary.failed == 0)
}

/// Logs orchestrator events and turns them into notices until the channel
/// closes. The free-space check is reported whenever it comes back, without
/// holding up the transfers.
async fn forward_events(
    mut events: UnboundedReceiver<UploadEvent>,
    mut space: JoinHandle<Result<SpaceInfo, ClientError>>,
    needed: u64,
    mut board: NoticeBoard,
) -> NoticeBoard {
    let mut space_pending = true;
    loop {
        tokio::select! {
            biased;
            joined = &mut space, if space_pending => {
                space_pending = false;
                match joined {
                    Ok(Ok(info)) => {
                        if let Some(id) = board.record_space(needed, info.free) {
                            show(&board, id);
                        }
                    }
                    Ok(Err(e)) => debug!(error = %e, "free-space check failed"),
                    Err(e) => debug!(error = %e, "free-space task ended"),
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    UploadEvent::Started { id, name } => info!(item = %id, %name, "upload started"),
                    UploadEvent::Progress { id, percent } => debug!(item = %id, percent, "progress"),
                    _ => {}
                }
                if let Some(id) = board.record_event(&event) {
                    show(&board, id);
                }
            }
        }
    }
    if space_pending {
        space.abort();
    }
    board
}

/// Prints the folder list and the default folder.
pub async fn folders(client: &Client) -> anyhow::Result<()> {
    let (folders, default_folder) = tokio::join!(client.folders(), client.default_folder());
    let folders = folders?;
    let default_folder = default_folder?;

    for folder in &folders {
        let marker = if Some(folder) == default_folder.as_ref() {
            " (default)"
        } else {
            ""
        };
        println!("{folder}{marker}");
    }
    if default_folder.is_none() {
        println!(
            "no default folder set; uploads go to {}",
            titanic_protocol::constants::FALLBACK_FOLDER
        );
    }
    Ok(())
}

/// Prints storage totals.
pub async fn space(client: &Client) -> anyhow::Result<()> {
    let info = client.space().await?;
    println!("total: {}", format_bytes(info.total));
    println!("used:  {}", format_bytes(info.used));
    println!("free:  {}", format_bytes(info.free));
    Ok(())
}

/// Checks that the backend answers.
pub async fn health(client: &Client) -> anyhow::Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("{} is not healthy", client.base_url()))?;
    match health {
        Some(h) => println!("{} is up ({})", client.base_url(), h.status),
        None => println!("{} is up", client.base_url()),
    }
    Ok(())
}

fn show(board: &NoticeBoard, id: u64) {
    if let Some(notice) = board.get(id) {
        eprintln!("{}", render(notice));
    }
}

fn render(notice: &Notice) -> String {
    let tag = match notice.severity {
        Severity::Success => "ok",
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    };
    match &notice.detail {
        Some(detail) => format!("[{tag}] {}: {detail}", notice.title),
        None => format!("[{tag}] {}", notice.title),
    }
}

/// Formats a byte count with binary units, one decimal above bytes.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
