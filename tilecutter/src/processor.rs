//! The tile processor capability and backend selection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              CLI / GUI / automation caller               │
//! │            builds InstructionSet, picks a backend        │
//! └──────────────────────────────────────────────────────────┘
//!                              │ create_processor()
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  TileProcessor trait                     │
//! │   validate(&InstructionSet)   process(&InstructionSet)   │
//! └──────────────────────────────────────────────────────────┘
//!            │                     │                    │
//!            ▼                     ▼                    ▼
//! ┌───────────────────┐ ┌────────────────────┐ ┌──────────────────┐
//! │DirectRasterProc.  │ │ BatchProcessor     │ │VectorMapProcessor│
//! │ image crop+resize │ │ external converter │ │ OSM + MapCSS     │
//! └───────────────────┘ └────────────────────┘ └──────────────────┘
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::batch::{BatchProcessor, ProcessRunner, DEFAULT_MAX_ARGS_LENGTH, DEFAULT_PROGRAM};
use crate::error::{TileError, ValidationError};
use crate::instructions::InstructionSet;
use crate::progress::{ProgressReporter, RunSummary};
use crate::raster::DirectRasterProcessor;
use crate::vector::VectorMapProcessor;

/// A tiling backend.
///
/// Implementations must be thread-safe: a job runs `process` on a blocking
/// worker thread while the caller keeps its own thread free.
pub trait TileProcessor: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Pre-flight checks. No side effects.
    fn validate(&self, instructions: &InstructionSet) -> Result<(), ValidationError>;

    /// Generates every tile of the run.
    ///
    /// Validates again before doing any work. Stops at the first fatal error;
    /// tiles already written stay on disk.
    fn process(
        &self,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError>;
}

impl<T: TileProcessor + ?Sized> TileProcessor for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, instructions: &InstructionSet) -> Result<(), ValidationError> {
        (**self).validate(instructions)
    }

    fn process(
        &self,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError> {
        (**self).process(instructions, progress)
    }
}

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// In-process crop and resize.
    #[default]
    Direct,
    /// Batched invocations of an external image converter.
    Batch,
    /// Rendering from an OSM extract and MapCSS stylesheet.
    Osm,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Direct => "direct",
            BackendKind::Batch => "batch",
            BackendKind::Osm => "osm",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" | "raster" => Ok(BackendKind::Direct),
            "batch" | "magick" => Ok(BackendKind::Batch),
            "osm" | "vector" => Ok(BackendKind::Osm),
            other => Err(format!(
                "unknown backend '{}' (expected direct, batch or osm)",
                other
            )),
        }
    }
}

/// Settings that only some backends use.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    /// Converter executable for the batch backend.
    pub program: PathBuf,
    /// Upper bound on the combined argument length of one invocation.
    pub max_args_length: usize,
    /// Log every external command line.
    pub debug: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            max_args_length: DEFAULT_MAX_ARGS_LENGTH,
            debug: false,
        }
    }
}

/// Creates the processor for `kind`.
pub fn create_processor(kind: BackendKind, settings: &BackendSettings) -> Arc<dyn TileProcessor> {
    match kind {
        BackendKind::Direct => Arc::new(DirectRasterProcessor::new()),
        BackendKind::Batch => Arc::new(
            BatchProcessor::new(ProcessRunner::new(&settings.program))
                .with_max_args_length(settings.max_args_length)
                .with_debug(settings.debug),
        ),
        BackendKind::Osm => Arc::new(VectorMapProcessor::new()),
    }
}
