//! `cut`: generate the tile pyramid of one input.
//!
//! Command-line values override the configuration file, which overrides the
//! built-in defaults. The run itself happens on a blocking worker inside a
//! tokio runtime; this thread only draws progress and listens for Ctrl-C.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use tilecutter::{create_processor, BackendKind, InstructionSet, RunSummary, TileError, TileJob};
use tracing::{info, warn};

use super::common::{BackendType, FormatType};
use crate::error::CliError;
use crate::progress::{format_duration, ProgressDisplay};
use crate::runner::CliRunner;

/// Arguments for the `cut` command.
#[derive(Debug, Args)]
pub struct CutArgs {
    /// Source image, or OSM extract for the osm backend
    pub input: PathBuf,

    /// Directory for the tiles [default: the input's directory]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base name of the tile files [default: the input's file stem]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Tile edge in pixels (power of two, at least 128)
    #[arg(short, long)]
    pub size: Option<u32>,

    /// Tile image format
    #[arg(short, long, value_enum, visible_alias = "extension")]
    pub format: Option<FormatType>,

    /// First zoom level to generate
    #[arg(long)]
    pub min_zoom: Option<u8>,

    /// Last zoom level to generate
    #[arg(short = 'z', long)]
    pub max_zoom: Option<u8>,

    /// Leave tiles that already exist untouched
    #[arg(short = 'k', long)]
    pub skip: bool,

    /// Tiling backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendType>,

    /// Converter executable for the batch backend
    #[arg(long, value_name = "PATH")]
    pub magick: Option<PathBuf>,

    /// OSM backend: multiply node coordinates before rendering
    #[arg(long)]
    pub resize_factor: Option<u32>,

    /// OSM backend: extent of the source map in degrees
    #[arg(long)]
    pub map_size: Option<f64>,
}

/// Output directory used when `--output` is absent.
fn default_output_directory(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn run(args: CutArgs, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(debug)?;
    runner.log_startup("cut");
    let config = runner.config();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_directory(&args.input));

    let instructions = build_instructions(&args, config.instructions(&args.input, &output));

    std::fs::create_dir_all(&instructions.output_directory).map_err(|error| {
        CliError::OutputDirectory {
            path: instructions.output_directory.display().to_string(),
            error,
        }
    })?;

    let backend: BackendKind = args
        .backend
        .map(Into::into)
        .unwrap_or(config.tiles.backend);
    let mut settings = config.backend_settings(debug);
    if let Some(program) = args.magick {
        settings.program = program;
    }

    let processor = create_processor(backend, &settings);
    processor
        .validate(&instructions)
        .map_err(TileError::from)?;

    println!(
        "Cutting {} with the {} backend",
        instructions.input_path.display(),
        processor.name()
    );
    println!(
        "  zoom {}..={}, {}px {} tiles -> {}",
        instructions.minimum_zoom,
        instructions.maximum_zoom,
        instructions.output_size,
        instructions.output_format,
        instructions.output_directory.display()
    );
    info!(
        backend = %backend,
        input = %instructions.input_path.display(),
        output = %instructions.output_directory.display(),
        total = instructions.total_tiles(),
        "Starting tiling run"
    );

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let started = Instant::now();
    let summary = runtime.block_on(drive(processor, instructions))?;

    println!(
        "Done: {} tiles written, {} skipped in {}",
        summary.written,
        summary.skipped,
        format_duration(started.elapsed())
    );
    info!(
        written = summary.written,
        skipped = summary.skipped,
        "Tiling run finished"
    );
    Ok(())
}

fn build_instructions(
    args: &CutArgs,
    mut builder: tilecutter::InstructionSetBuilder,
) -> InstructionSet {
    if let Some(name) = &args.name {
        builder = builder.output_name(name.clone());
    }
    if let Some(size) = args.size {
        builder = builder.output_size(size);
    }
    if let Some(format) = args.format {
        builder = builder.output_format(format.into());
    }
    if let Some(factor) = args.resize_factor {
        builder = builder.preprocessor_resize_factor(factor);
    }
    if let Some(map_size) = args.map_size {
        builder = builder.map_size(map_size);
    }
    if args.skip {
        builder = builder.skip_existing(true);
    }

    let mut instructions = builder.build();
    if let Some(min) = args.min_zoom {
        instructions.minimum_zoom = min;
    }
    if let Some(max) = args.max_zoom {
        instructions.maximum_zoom = max;
    }
    instructions
}

async fn drive(
    processor: std::sync::Arc<dyn tilecutter::TileProcessor>,
    instructions: InstructionSet,
) -> Result<RunSummary, CliError> {
    let mut handle = TileJob::start(processor, instructions)?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });

    let mut display = ProgressDisplay::new();
    while let Some(event) = handle.next_progress().await {
        display.update(&event);
    }
    display.finish();

    Ok(handle.wait().await?)
}
