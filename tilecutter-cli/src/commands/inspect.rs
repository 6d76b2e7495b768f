//! `inspect`: report whether an image can be tiled and how deep.

use std::path::Path;

use tilecutter::plan::total_tiles;
use tilecutter::{dimensions_of, TilePlan};

use crate::error::CliError;

pub fn run(image: &Path, max_zoom: u8) -> Result<(), CliError> {
    let dims = dimensions_of(image).ok_or_else(|| {
        CliError::Usage(format!(
            "'{}' is not a readable PNG, JPEG, BMP or GIF image",
            image.display()
        ))
    })?;

    println!("Image:      {}", image.display());
    println!("Dimensions: {}x{}", dims.width, dims.height);

    if !dims.is_square() {
        println!("Not square: only square images can be tiled");
        return Ok(());
    }

    // Zoom levels past this would need tiles under one source pixel
    let deepest = dims.width.checked_ilog2().unwrap_or(0) as u8;
    let max_zoom = max_zoom.min(deepest).min(tilecutter::plan::MAX_ZOOM);

    println!();
    println!("{:>5}  {:>9}  {:>11}  {:>10}", "Zoom", "Grid", "Source px", "Total");
    let plan = TilePlan::new(dims.width, dims.height, 0, max_zoom);
    for level in plan.zoom_levels() {
        println!(
            "{:>5}  {:>9}  {:>11}  {:>10}",
            level.zoom,
            format!("{0}x{0}", level.tiles_per_side),
            level.tile_width,
            total_tiles(0, level.zoom)
        );
    }

    Ok(())
}
