//! In-process raster backend.
//!
//! Decodes the source once, then for every planned tile crops the source
//! rectangle and resizes it to `output_size × output_size` with a bicubic
//! (Catmull-Rom) filter. Samples outside the crop are clamped to its edge, so
//! neighbouring tiles meet without seams.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};
use tracing::{debug, info};

use crate::error::{TileError, ValidationError};
use crate::instructions::{validate_raster, InstructionSet};
use crate::plan::{OutputFormat, TileDescriptor, TilePlan};
use crate::processor::TileProcessor;
use crate::progress::{ProgressReporter, RunSummary};

/// Resampling filter used for every tile.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Decodes the whole source image.
///
/// Sources are only bounded by the header check in validation, so the
/// decoder's default allocation limit is lifted.
pub fn open_source(path: &Path) -> Result<DynamicImage, TileError> {
    open_source_with_limits(path, Limits::no_limits())
}

fn open_source_with_limits(path: &Path, limits: Limits) -> Result<DynamicImage, TileError> {
    let mut reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| TileError::io(path, e))?;
    reader.limits(limits);
    reader.decode().map_err(|e| TileError::image(path, e))
}

/// Crops and resizes tiles with the `image` crate.
#[derive(Debug, Default, Clone)]
pub struct DirectRasterProcessor;

impl DirectRasterProcessor {
    pub fn new() -> Self {
        Self
    }
}

/// Cuts the tile described by `tile` out of `source` and scales it to `size`.
pub fn cut_tile(source: &DynamicImage, tile: &TileDescriptor, size: u32) -> DynamicImage {
    if tile.is_whole_image() {
        return source.resize_exact(size, size, RESIZE_FILTER);
    }
    let rect = tile.source;
    source
        .crop_imm(rect.x, rect.y, rect.width, rect.height)
        .resize_exact(size, size, RESIZE_FILTER)
}

/// Writes `tile` to `path`, converting to a color type the format can encode.
pub fn save_tile(tile: &DynamicImage, path: &Path, format: OutputFormat) -> Result<(), TileError> {
    let encodable = match format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(tile.to_rgb8()),
        OutputFormat::Bmp | OutputFormat::Gif => DynamicImage::ImageRgba8(tile.to_rgba8()),
        OutputFormat::Png => match tile {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => tile.clone(),
            _ => DynamicImage::ImageRgba8(tile.to_rgba8()),
        },
    };
    encodable
        .save_with_format(path, format.image_format())
        .map_err(|e| TileError::image(path, e))
}

impl TileProcessor for DirectRasterProcessor {
    fn name(&self) -> &str {
        "Direct raster"
    }

    fn validate(&self, instructions: &InstructionSet) -> Result<(), ValidationError> {
        validate_raster(instructions).map(|_| ())
    }

    fn process(
        &self,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError> {
        validate_raster(instructions)?;

        let input = &instructions.input_path;
        info!(input = %input.display(), "Opening input image");
        let source = open_source(input)?;

        let plan = TilePlan::new(
            source.width(),
            source.height(),
            instructions.minimum_zoom,
            instructions.maximum_zoom,
        );
        let size = instructions.output_size;

        for level in plan.zoom_levels() {
            info!(
                zoom = level.zoom,
                tiles = level.tile_count(),
                source_tile = level.tile_width,
                "Processing zoom level"
            );
            progress.zoom_started(level.zoom);

            for tile in plan.tiles_at(level.zoom) {
                progress.checkpoint()?;

                let path = instructions.tile_path(tile.zoom, tile.x, tile.y);
                if instructions.skip_existing && path.exists() {
                    debug!(path = %path.display(), "Skipping existing tile");
                    progress.tile_skipped();
                    continue;
                }

                let output = cut_tile(&source, &tile, size);
                save_tile(&output, &path, instructions.output_format)?;
                debug!(path = %path.display(), "Tile written");
                progress.tile_written();
            }
        }

        let summary = progress.summary();
        info!(
            written = summary.written,
            skipped = summary.skipped,
            "Raster tiling complete"
        );
        Ok(summary)
    }
}
