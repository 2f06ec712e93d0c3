//! User-facing notices for an upload session.
//!
//! Turns orchestrator events, intake rejections and free-space checks into
//! short-lived notices. Display timing is up to the front end; this crate
//! only holds the queue.

use std::time::Duration;

use titanic_uploads::{IntakeOutcome, SubmitReport, UploadEvent};
use tracing::debug;

/// How long an ordinary notice stays visible.
const DEFAULT_DURATION: Duration = Duration::from_secs(4);

/// Failures linger longer.
const ERROR_DURATION: Duration = Duration::from_secs(6);

/// Visual category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    fn duration(self) -> Duration {
        match self {
            Self::Error => ERROR_DURATION,
            _ => DEFAULT_DURATION,
        }
    }
}

/// One queued notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub severity: Severity,
    pub title: String,
    pub detail: Option<String>,
    pub duration: Duration,
}

/// Ordered notice queue with monotonic ids.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notice and returns its id.
    pub fn push(
        &mut self,
        severity: Severity,
        title: impl Into<String>,
        detail: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let title = title.into();
        debug!(id, ?severity, %title, "notice queued");
        self.notices.push(Notice {
            id,
            severity,
            title,
            detail,
            duration: severity.duration(),
        });
        id
    }

    /// Queues the notice an orchestrator event calls for, if any.
    ///
    /// Only terminal events produce notices; start and progress events
    /// are reflected in the item list instead.
    pub fn record_event(&mut self, event: &UploadEvent) -> Option<u64> {
        match event {
            UploadEvent::Uploaded { name, .. } => {
                Some(self.push(Severity::Success, format!("Uploaded {name}"), None))
            }
            UploadEvent::Failed { name, error, .. } => Some(self.push(
                Severity::Error,
                format!("Failed to upload {name}"),
                Some(error.clone()),
            )),
            UploadEvent::Started { .. } | UploadEvent::Progress { .. } => None,
        }
    }

    /// Queues the aggregated warning for files rejected at intake.
    pub fn record_intake(&mut self, outcome: &IntakeOutcome) -> Option<u64> {
        let notice = outcome.rejection_notice()?;
        Some(self.push(Severity::Warning, notice, None))
    }

    /// Warns when a batch of `needed` bytes will not fit into `free` bytes.
    pub fn record_space(&mut self, needed: u64, free: u64) -> Option<u64> {
        if needed <= free {
            return None;
        }
        Some(self.push(
            Severity::Warning,
            "Not enough free space on the server",
            Some(format!("batch needs {needed} bytes, {free} available")),
        ))
    }

    /// Queues a one-line summary of a finished `submit()`.
    pub fn record_report(&mut self, report: &SubmitReport) -> Option<u64> {
        if report.is_empty() {
            return None;
        }
        let (ok, failed) = (report.succeeded(), report.failed());
        let (severity, title) = if failed == 0 {
            (Severity::Info, format!("{ok} file(s) uploaded"))
        } else {
            (
                Severity::Warning,
                format!("{ok} file(s) uploaded, {failed} failed"),
            )
        };
        Some(self.push(severity, title, None))
    }

    /// Removes a notice. Returns `true` if it was queued.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn get(&self, id: u64) -> Option<&Notice> {
        self.notices.iter().find(|n| n.id == id)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Empties the queue, returning notices oldest first.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titanic_uploads::{ItemId, ItemOutcome, TransferFailure};

    #[test]
    fn ids_are_monotonic_and_order_is_kept() {
        let mut board = NoticeBoard::new();
        let a = board.push(Severity::Info, "first", None);
        let b = board.push(Severity::Error, "second", None);
        assert_eq!((a, b), (0, 1));

        let titles: Vec<&str> = board.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn errors_stay_longer() {
        let mut board = NoticeBoard::new();
        let ok = board.push(Severity::Success, "ok", None);
        let bad = board.push(Severity::Error, "bad", None);
        assert_eq!(board.get(ok).unwrap().duration, Duration::from_secs(4));
        assert_eq!(board.get(bad).unwrap().duration, Duration::from_secs(6));
    }

    #[test]
    fn only_terminal_events_make_notices() {
        let mut board = NoticeBoard::new();
        let id = ItemId::new();

        assert!(
            board
                .record_event(&UploadEvent::Started {
                    id: id.clone(),
                    name: "a.mp4".into()
                })
                .is_none()
        );
        assert!(
            board
                .record_event(&UploadEvent::Progress {
                    id: id.clone(),
                    percent: 50
                })
                .is_none()
        );

        let failed = board
            .record_event(&UploadEvent::Failed {
                id,
                name: "a.mp4".into(),
                error: "folder not found".into(),
            })
            .unwrap();
        let notice = board.get(failed).unwrap();
        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(notice.title, "Failed to upload a.mp4");
        assert_eq!(notice.detail.as_deref(), Some("folder not found"));
    }

    #[test]
    fn intake_rejections_aggregate_into_one_warning() {
        let mut board = NoticeBoard::new();
        let outcome = IntakeOutcome {
            accepted: vec![ItemId::new()],
            rejected: vec!["document.pdf".into(), "notes.txt".into()],
        };
        let id = board.record_intake(&outcome).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(
            board.get(id).unwrap().title,
            "2 file(s) skipped (not a video): document.pdf, notes.txt"
        );

        let clean = IntakeOutcome {
            accepted: vec![ItemId::new()],
            rejected: Vec::new(),
        };
        assert!(board.record_intake(&clean).is_none());
    }

    #[test]
    fn space_warning_only_when_short() {
        let mut board = NoticeBoard::new();
        assert!(board.record_space(100, 100).is_none());
        let id = board.record_space(101, 100).unwrap();
        assert_eq!(board.get(id).unwrap().severity, Severity::Warning);
    }

    #[test]
    fn report_summary() {
        let mut board = NoticeBoard::new();
        assert!(board.record_report(&SubmitReport::default()).is_none());

        let report = SubmitReport {
            outcomes: vec![
                ItemOutcome {
                    id: ItemId::new(),
                    name: "a.mp4".into(),
                    result: Ok(()),
                },
                ItemOutcome {
                    id: ItemId::new(),
                    name: "b.mp4".into(),
                    result: Err(TransferFailure::Auth),
                },
            ],
        };
        let id = board.record_report(&report).unwrap();
        let notice = board.get(id).unwrap();
        assert_eq!(notice.title, "1 file(s) uploaded, 1 failed");
        assert_eq!(notice.severity, Severity::Warning);
    }

    #[test]
    fn dismiss_and_drain() {
        let mut board = NoticeBoard::new();
        let a = board.push(Severity::Info, "a", None);
        board.push(Severity::Info, "b", None);

        assert!(board.dismiss(a));
        assert!(!board.dismiss(a));
        assert_eq!(board.len(), 1);

        let drained = board.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].title, "b");
        assert!(board.is_empty());
    }
}
