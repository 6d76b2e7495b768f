//! Progress reporting and cancellation for a running job.
//!
//! The worker owns the [`ProgressReporter`] and with it the completed-tile
//! counter. Events travel over an unbounded channel, so the caller drains them
//! on its own thread and schedule.
//!
//! ```text
//! worker (spawn_blocking)          channel              caller
//!    │ zoom_started(z)                │                   │
//!    ├───────────────────────────────►│ ProgressEvent     │
//!    │ tile_written / tile_skipped    │                   │
//!    ├───────────────────────────────►│──────────────────►│ recv()
//!    │ checkpoint()  ◄── cancel() ────┼───────────────────┤
//! ```

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::TileError;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Tiles finished so far (written or skipped).
    pub completed: u64,
    /// Tiles expected for the whole run.
    pub total: u64,
    pub label: String,
}

impl ProgressEvent {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: u64,
    pub skipped: u64,
}

impl RunSummary {
    pub fn completed(&self) -> u64 {
        self.written + self.skipped
    }
}

/// Worker-side handle for emitting progress and observing cancellation.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<ProgressEvent>>,
    cancellation: CancellationToken,
    total: u64,
    label: String,
    summary: RunSummary,
}

impl ProgressReporter {
    pub fn new(
        total: u64,
        sender: Option<UnboundedSender<ProgressEvent>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            sender,
            cancellation,
            total,
            label: String::new(),
            summary: RunSummary::default(),
        }
    }

    /// Reporter that drops events and is never cancelled.
    pub fn silent(total: u64) -> Self {
        Self::new(total, None, CancellationToken::new())
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.summary.completed()
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn zoom_started(&mut self, zoom: u8) {
        self.label = format!("Processing zoom {}", zoom);
        self.emit();
    }

    pub fn tile_written(&mut self) {
        self.summary.written += 1;
        self.emit();
    }

    pub fn tile_skipped(&mut self) {
        self.summary.skipped += 1;
        self.emit();
    }

    /// Fails with [`TileError::Cancelled`] once the caller has cancelled.
    pub fn checkpoint(&self) -> Result<(), TileError> {
        if self.cancellation.is_cancelled() {
            return Err(TileError::Cancelled);
        }
        Ok(())
    }

    fn emit(&self) {
        if let Some(sender) = &self.sender {
            // Receiver may be gone; the run continues regardless.
            let _ = sender.send(ProgressEvent {
                completed: self.summary.completed(),
                total: self.total,
                label: self.label.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_events_carry_running_count() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reporter = ProgressReporter::new(5, Some(tx), CancellationToken::new());

        reporter.zoom_started(0);
        reporter.tile_written();
        reporter.zoom_started(1);
        reporter.tile_skipped();
        reporter.tile_written();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let counts: Vec<_> = events.iter().map(|e| e.completed).collect();
        assert_eq!(counts, vec![0, 1, 1, 2, 3]);
        assert_eq!(events[0].label, "Processing zoom 0");
        assert_eq!(events[4].label, "Processing zoom 1");
        assert!(events.iter().all(|e| e.total == 5));
        assert_eq!(reporter.summary(), RunSummary { written: 2, skipped: 1 });
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut reporter = ProgressReporter::new(1, Some(tx), CancellationToken::new());
        reporter.tile_written();
        assert_eq!(reporter.completed(), 1);
    }

    #[test]
    fn test_checkpoint_observes_cancellation() {
        let token = CancellationToken::new();
        let reporter = ProgressReporter::new(1, None, token.clone());
        assert!(reporter.checkpoint().is_ok());

        token.cancel();
        assert!(matches!(reporter.checkpoint(), Err(TileError::Cancelled)));
    }

    #[test]
    fn test_fraction() {
        let event = ProgressEvent {
            completed: 5,
            total: 20,
            label: String::new(),
        };
        assert!((event.fraction() - 0.25).abs() < f64::EPSILON);
    }
}
