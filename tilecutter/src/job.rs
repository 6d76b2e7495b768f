//! Running a processor as a job.
//!
//! [`TileJob::start`] validates on the caller's thread, then moves the work to
//! tokio's blocking pool. The returned [`JobHandle`] streams progress, cancels
//! and waits for the outcome.
//!
//! # Example
//!
//! ```ignore
//! use tilecutter::job::TileJob;
//!
//! let mut handle = TileJob::start(processor, instructions)?;
//! while let Some(event) = handle.next_progress().await {
//!     println!("{}/{} {}", event.completed, event.total, event.label);
//! }
//! let summary = handle.wait().await?;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TileError;
use crate::instructions::InstructionSet;
use crate::processor::TileProcessor;
use crate::progress::{ProgressEvent, ProgressReporter, RunSummary};

/// Entry point for asynchronous runs.
pub struct TileJob;

impl TileJob {
    /// Validates `instructions` and starts processing in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        processor: Arc<dyn TileProcessor>,
        instructions: InstructionSet,
    ) -> Result<JobHandle, TileError> {
        processor.validate(&instructions)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancellation = CancellationToken::new();
        let total = instructions.total_tiles();
        let reporter = ProgressReporter::new(total, Some(tx), cancellation.clone());

        info!(
            backend = processor.name(),
            input = %instructions.input_path.display(),
            total,
            "Starting tiling job"
        );
        let task = tokio::task::spawn_blocking(move || {
            let mut reporter = reporter;
            processor.process(&instructions, &mut reporter)
        });

        Ok(JobHandle {
            progress: rx,
            cancellation,
            task,
        })
    }
}

/// Caller-side handle of a running job.
pub struct JobHandle {
    progress: UnboundedReceiver<ProgressEvent>,
    cancellation: CancellationToken,
    task: JoinHandle<Result<RunSummary, TileError>>,
}

impl JobHandle {
    /// Next progress event, or `None` once the worker has finished.
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    /// Asks the worker to stop before its next tile.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Token that cancels this job, for wiring into signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Waits for the worker and returns its outcome.
    ///
    /// Undelivered progress events are dropped.
    pub async fn wait(self) -> Result<RunSummary, TileError> {
        match self.task.await {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!(error = %e, "Tiling job failed");
                }
                result
            }
            Err(e) => Err(TileError::Worker(e.to_string())),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Runs `processor` on the current thread.
///
/// Progress goes to `sink` if given. For callers without a tokio runtime.
pub fn run_blocking(
    processor: &dyn TileProcessor,
    instructions: &InstructionSet,
    sink: Option<UnboundedSender<ProgressEvent>>,
) -> Result<RunSummary, TileError> {
    processor.validate(instructions)?;
    let mut reporter =
        ProgressReporter::new(instructions.total_tiles(), sink, CancellationToken::new());
    processor.process(instructions, &mut reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::raster::DirectRasterProcessor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, InstructionSet) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("src.png");
        image::RgbImage::from_pixel(512, 512, image::Rgb([10, 20, 30]))
            .save(&input)
            .unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let set = InstructionSet::builder(&input, &out)
            .output_size(128)
            .zoom_range(0, 2)
            .build();
        (dir, set)
    }

    /// Blocks until cancelled, then reports cancellation.
    struct WaitForCancel;

    impl TileProcessor for WaitForCancel {
        fn name(&self) -> &str {
            "wait"
        }

        fn validate(&self, _: &InstructionSet) -> Result<(), ValidationError> {
            Ok(())
        }

        fn process(
            &self,
            _: &InstructionSet,
            progress: &mut ProgressReporter,
        ) -> Result<RunSummary, TileError> {
            progress.zoom_started(0);
            loop {
                progress.checkpoint()?;
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
    }

    struct Panics;

    impl TileProcessor for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn validate(&self, _: &InstructionSet) -> Result<(), ValidationError> {
            Ok(())
        }

        fn process(&self, _: &InstructionSet, _: &mut ProgressReporter) -> Result<RunSummary, TileError> {
            panic!("worker blew up");
        }
    }

    #[tokio::test]
    async fn test_job_streams_progress_then_completes() {
        let (_dir, set) = setup();
        let mut handle = TileJob::start(Arc::new(DirectRasterProcessor::new()), set.clone()).unwrap();

        let mut events = Vec::new();
        while let Some(event) = handle.next_progress().await {
            events.push(event);
        }
        let summary = handle.wait().await.unwrap();

        assert_eq!(summary.written, 21);
        let last = events.last().unwrap();
        assert_eq!((last.completed, last.total), (21, 21));
        assert_eq!(last.label, "Processing zoom 2");
        assert!(events.windows(2).all(|w| w[0].completed <= w[1].completed));
        assert!(set.tile_path(2, 3, 3).exists());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_instructions() {
        let (dir, set) = setup();
        let set = InstructionSet {
            output_directory: dir.path().join("missing"),
            ..set
        };
        let err = TileJob::start(Arc::new(DirectRasterProcessor::new()), set).unwrap_err();
        assert!(matches!(
            err,
            TileError::Invalid(ValidationError::OutputDirectoryMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_the_worker() {
        let (_dir, set) = setup();
        let mut handle = TileJob::start(Arc::new(WaitForCancel), set).unwrap();

        let first = handle.next_progress().await.unwrap();
        assert_eq!(first.label, "Processing zoom 0");
        handle.cancel();

        assert!(matches!(handle.wait().await, Err(TileError::Cancelled)));
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_error() {
        let (_dir, set) = setup();
        let handle = TileJob::start(Arc::new(Panics), set).unwrap();
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, TileError::Worker(_)));
    }

    #[test]
    fn test_run_blocking_without_runtime() {
        let (_dir, set) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = run_blocking(&DirectRasterProcessor::new(), &set, Some(tx)).unwrap();

        assert_eq!(summary.written, 21);
        let count = std::iter::from_fn(|| rx.try_recv().ok()).count();
        // three zoom announcements plus one event per tile
        assert_eq!(count, 24);
    }
}
