//! Batched external-converter backend.
//!
//! Starting an image converter once per tile is dominated by process start-up,
//! so this backend packs many crop/resize/write sub-commands into one
//! invocation of an ImageMagick-compatible `convert`:
//!
//! ```text
//! convert <input> ( +clone -crop WxH+X+Y +repage -resize SxS! -write <tile> +delete ) ... null:
//! ```
//!
//! Sub-commands are queued per zoom level. The queue is flushed whenever the
//! next sub-command would push the combined argument length past the limit,
//! and once more at the end of every zoom level. A failed invocation (launch
//! error, non-zero exit, or a tile missing afterwards) aborts the run.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{TileError, ValidationError};
use crate::instructions::{validate_raster, InstructionSet};
use crate::plan::{TileDescriptor, TilePlan};
use crate::processor::TileProcessor;
use crate::progress::{ProgressReporter, RunSummary};

/// Converter executable looked up on `PATH` by default.
pub const DEFAULT_PROGRAM: &str = "convert";

/// Default upper bound on the combined argument length of one invocation.
pub const DEFAULT_MAX_ARGS_LENGTH: usize = 6000;

/// Output sink that discards the base image once all tiles are written.
const NULL_OUTPUT: &str = "null:";

/// Runs the external converter.
///
/// Behind a trait so the batching logic can be exercised without an
/// ImageMagick installation.
pub trait CommandRunner: Send + Sync {
    /// Program name used in logs and errors.
    fn program(&self) -> String;

    /// Runs the program with `args` and waits for it to exit.
    fn run(&self, args: &[String]) -> Result<(), TileError>;
}

/// Runs the converter as a child process and checks its exit status.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn program(&self) -> String {
        self.program.display().to_string()
    }

    fn run(&self, args: &[String]) -> Result<(), TileError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| TileError::ExternalTool {
                program: self.program(),
                message: format!("failed to start: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TileError::ExternalTool {
                program: self.program(),
                message: format!("{} {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// One crop/resize/write sub-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCommand {
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl BatchCommand {
    /// Builds the sub-command for `tile`. Zoom 0 only resizes.
    pub fn for_tile(tile: &TileDescriptor, output_size: u32, output: PathBuf) -> Self {
        let mut args = vec!["(".to_string(), "+clone".to_string()];
        if !tile.is_whole_image() {
            let r = tile.source;
            args.push("-crop".to_string());
            args.push(format!("{}x{}+{}+{}", r.width, r.height, r.x, r.y));
            args.push("+repage".to_string());
        }
        args.push("-resize".to_string());
        args.push(format!("{0}x{0}!", output_size));
        args.push("-write".to_string());
        args.push(output.display().to_string());
        args.push("+delete".to_string());
        args.push(")".to_string());

        Self { output, args }
    }

    /// Length on a command line, separators included.
    pub fn len(&self) -> usize {
        args_len(&self.args)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

fn args_len(args: &[String]) -> usize {
    args.iter().map(|a| a.len() + 1).sum()
}

/// Sub-commands waiting for the next invocation.
#[derive(Debug)]
struct CommandQueue {
    input: String,
    max_len: usize,
    commands: Vec<BatchCommand>,
    queued_len: usize,
}

impl CommandQueue {
    fn new(input: &Path, max_len: usize) -> Self {
        Self {
            input: input.display().to_string(),
            max_len,
            commands: Vec::new(),
            queued_len: 0,
        }
    }

    fn base_len(&self) -> usize {
        self.input.len() + 1 + NULL_OUTPUT.len()
    }

    /// True if `command` no longer fits next to what is queued.
    fn would_overflow(&self, command: &BatchCommand) -> bool {
        !self.commands.is_empty() && self.base_len() + self.queued_len + command.len() > self.max_len
    }

    fn push(&mut self, command: BatchCommand) {
        self.queued_len += command.len();
        self.commands.push(command);
    }

    fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Full argument list and the queued sub-commands, leaving the queue empty.
    fn take(&mut self) -> (Vec<String>, Vec<BatchCommand>) {
        let commands = std::mem::take(&mut self.commands);
        self.queued_len = 0;

        let mut args = vec![self.input.clone()];
        args.extend(commands.iter().flat_map(|c| c.args.iter().cloned()));
        args.push(NULL_OUTPUT.to_string());
        (args, commands)
    }
}

/// Tiles through an external converter in batches.
pub struct BatchProcessor<R: CommandRunner> {
    runner: R,
    max_args_length: usize,
    debug: bool,
}

impl<R: CommandRunner> BatchProcessor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            max_args_length: DEFAULT_MAX_ARGS_LENGTH,
            debug: false,
        }
    }

    pub fn with_max_args_length(mut self, length: usize) -> Self {
        self.max_args_length = length;
        self
    }

    /// Log every command line at info level instead of debug.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn flush(&self, queue: &mut CommandQueue, progress: &mut ProgressReporter) -> Result<(), TileError> {
        if queue.is_empty() {
            return Ok(());
        }
        let (args, commands) = queue.take();

        if self.debug {
            info!("{} {}", self.runner.program(), args.join(" "));
        } else {
            debug!(
                program = %self.runner.program(),
                tiles = commands.len(),
                length = args_len(&args),
                "Running converter batch"
            );
        }

        self.runner.run(&args)?;

        for command in &commands {
            if !command.output.exists() {
                return Err(TileError::ExternalTool {
                    program: self.runner.program(),
                    message: format!("tile was not written: {}", command.output.display()),
                });
            }
            progress.tile_written();
        }
        Ok(())
    }
}

impl<R: CommandRunner> TileProcessor for BatchProcessor<R> {
    fn name(&self) -> &str {
        "ImageMagick batch"
    }

    fn validate(&self, instructions: &InstructionSet) -> Result<(), ValidationError> {
        validate_raster(instructions).map(|_| ())
    }

    fn process(
        &self,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError> {
        let dims = validate_raster(instructions)?;
        let plan = TilePlan::new(
            dims.width,
            dims.height,
            instructions.minimum_zoom,
            instructions.maximum_zoom,
        );
        let mut queue = CommandQueue::new(&instructions.input_path, self.max_args_length);

        for level in plan.zoom_levels() {
            info!(zoom = level.zoom, tiles = level.tile_count(), "Processing zoom level");
            progress.zoom_started(level.zoom);

            for tile in plan.tiles_at(level.zoom) {
                progress.checkpoint()?;

                let path = instructions.tile_path(tile.zoom, tile.x, tile.y);
                if instructions.skip_existing && path.exists() {
                    debug!(path = %path.display(), "Skipping existing tile");
                    progress.tile_skipped();
                    continue;
                }

                let command = BatchCommand::for_tile(&tile, instructions.output_size, path);
                if queue.would_overflow(&command) {
                    self.flush(&mut queue, progress)?;
                }
                queue.push(command);
            }

            self.flush(&mut queue, progress)?;
        }

        Ok(progress.summary())
    }
}
