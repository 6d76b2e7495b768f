//! Tile pyramid geometry and output naming.
//!
//! Zoom level `z` splits the source into a `2^z × 2^z` grid. Each tile covers
//! `floor(side / 2^z)` source pixels per axis and is later resized to the
//! configured output size.
//!
//! Tiles are written as `{name}.{zoom}.{x}.{y}{ext}`. The viewer builds tile
//! URLs from the same pattern, so the scheme must not change.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Deepest zoom level accepted anywhere in the pipeline.
pub const MAX_ZOOM: u8 = 24;

/// Raster format of the generated tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Bmp,
    Jpeg,
    Gif,
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => ".png",
            OutputFormat::Bmp => ".bmp",
            OutputFormat::Jpeg => ".jpg",
            OutputFormat::Gif => ".gif",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Bmp => image::ImageFormat::Bmp,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Gif => image::ImageFormat::Gif,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Gif => "gif",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "bmp" => Ok(OutputFormat::Bmp),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "gif" => Ok(OutputFormat::Gif),
            other => Err(format!(
                "unknown output format '{}' (expected png, bmp, jpg or gif)",
                other
            )),
        }
    }
}

/// File name of a single tile, e.g. `map.2.1.3.png`.
pub fn tile_file_name(base: &str, zoom: u8, x: u32, y: u32, format: OutputFormat) -> String {
    format!("{}.{}.{}.{}{}", base, zoom, x, y, format.extension())
}

/// Full output path of a single tile.
pub fn tile_path(dir: &Path, base: &str, zoom: u8, x: u32, y: u32, format: OutputFormat) -> PathBuf {
    dir.join(tile_file_name(base, zoom, x, y, format))
}

/// Number of tiles per axis at `zoom`.
#[inline]
pub fn tiles_per_side(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Total number of tiles across `min_zoom..=max_zoom` (sum of `4^z`).
///
/// Levels past [`MAX_ZOOM`] are never generated and are not counted.
pub fn total_tiles(min_zoom: u8, max_zoom: u8) -> u64 {
    (min_zoom..=max_zoom.min(MAX_ZOOM))
        .map(|z| 1u64 << (2 * z as u32))
        .sum()
}

/// Pixel rectangle in the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One tile of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileDescriptor {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    pub source: SourceRect,
}

impl TileDescriptor {
    pub fn file_name(&self, base: &str, format: OutputFormat) -> String {
        tile_file_name(base, self.zoom, self.x, self.y, format)
    }

    /// Zoom 0 covers the whole image and needs no crop.
    pub fn is_whole_image(&self) -> bool {
        self.zoom == 0
    }
}

/// Per-zoom summary of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomLevel {
    pub zoom: u8,
    pub tiles_per_side: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl ZoomLevel {
    pub fn tile_count(&self) -> u64 {
        self.tiles_per_side as u64 * self.tiles_per_side as u64
    }
}

/// The ordered set of tiles for one run.
///
/// A plan is a plain value; every call to [`TilePlan::iter`] starts over and
/// yields the same descriptors in the same order (zoom, then x, then y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    width: u32,
    height: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl TilePlan {
    pub fn new(width: u32, height: u32, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            width,
            height,
            min_zoom,
            max_zoom: max_zoom.min(MAX_ZOOM),
        }
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn total_tiles(&self) -> u64 {
        if self.min_zoom > self.max_zoom {
            return 0;
        }
        total_tiles(self.min_zoom, self.max_zoom)
    }

    pub fn zoom_level(&self, zoom: u8) -> ZoomLevel {
        let tiles = tiles_per_side(zoom);
        ZoomLevel {
            zoom,
            tiles_per_side: tiles,
            tile_width: self.width / tiles,
            tile_height: self.height / tiles,
        }
    }

    pub fn zoom_levels(&self) -> impl Iterator<Item = ZoomLevel> + '_ {
        (self.min_zoom..=self.max_zoom).map(move |z| self.zoom_level(z))
    }

    /// Tiles of a single zoom level.
    pub fn tiles_at(&self, zoom: u8) -> impl Iterator<Item = TileDescriptor> {
        let level = self.zoom_level(zoom);
        let tiles = level.tiles_per_side;
        (0..tiles).flat_map(move |x| {
            (0..tiles).map(move |y| TileDescriptor {
                zoom,
                x,
                y,
                source: SourceRect {
                    x: level.tile_width * x,
                    y: level.tile_height * y,
                    width: level.tile_width,
                    height: level.tile_height,
                },
            })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = TileDescriptor> + '_ {
        (self.min_zoom..=self.max_zoom).flat_map(move |z| self.tiles_at(z))
    }
}
