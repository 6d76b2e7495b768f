//! OpenStreetMap backend: renders tiles from an OSM extract and the MapCSS
//! stylesheet stored next to it (`<input>.mapcss`).
//!
//! The map covers a square of `map_size · resize_factor` degrees centred on
//! the origin. At zoom `z` each of the `2^z × 2^z` tiles covers an equal
//! sub-square, rendered at `output_size` pixels.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::{TileError, ValidationError};
use crate::instructions::{validate_osm, InstructionSet};
use crate::mapcss::StyleSheet;
use crate::osm::{self, OsmDocument};
use crate::plan::{tiles_per_side, TilePlan};
use crate::processor::TileProcessor;
use crate::progress::{ProgressReporter, RunSummary};
use crate::raster::save_tile;
use crate::render::{GeoPoint, MapRenderer, RenderView, SkiaMapRenderer, RENDER_SCALE};

/// View of tile `(x, y)` at `zoom` for a map `width` degrees wide.
pub fn tile_view(x: u32, y: u32, zoom: u8, width: f64, size: u32) -> RenderView {
    let tiles = tiles_per_side(zoom) as f64;
    let tile_geo = width / tiles;
    let half = width / 2.0;

    RenderView {
        center: GeoPoint::new(
            half - tile_geo * (y as f64 + 0.5),
            tile_geo * (x as f64 + 0.5) - half,
        ),
        zoom_factor: 100.0 * size as f64 / (RENDER_SCALE * width) * tiles,
        size,
    }
}

/// Path of the rescaled copy: `<dir>/<stem>.temp`.
pub fn temp_path(input: &Path) -> PathBuf {
    input.with_extension("temp")
}

/// Renders tiles from OpenStreetMap data.
#[derive(Debug, Default, Clone)]
pub struct VectorMapProcessor;

impl VectorMapProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Loads the data (rescaling it first if asked) and the stylesheet.
    fn prepare(&self, instructions: &InstructionSet) -> Result<SkiaMapRenderer, TileError> {
        let factor = instructions.preprocessor_resize_factor;
        let mut data_path = instructions.input_path.clone();
        if factor > 1 {
            let temp = temp_path(&instructions.input_path);
            info!(factor, temp = %temp.display(), "Rescaling OSM coordinates");
            osm::rescale(&instructions.input_path, &temp, factor as f64)?;
            data_path = temp;
        }

        let stylesheet_path = instructions.stylesheet_path();
        let source = std::fs::read_to_string(&stylesheet_path)
            .map_err(|e| TileError::io(&stylesheet_path, e))?;
        let stylesheet = StyleSheet::parse(&source)?;
        let document = OsmDocument::open(&data_path)?;

        Ok(SkiaMapRenderer::new(&document, &stylesheet))
    }

    /// Renders every tile of the run with `renderer`.
    pub fn render_tiles(
        &self,
        renderer: &dyn MapRenderer,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError> {
        let width = instructions.map_size * instructions.preprocessor_resize_factor as f64;
        let size = instructions.output_size;
        // The plan is resolution-independent here; only the grid is used.
        let plan = TilePlan::new(size, size, instructions.minimum_zoom, instructions.maximum_zoom);

        for level in plan.zoom_levels() {
            info!(
                zoom = level.zoom,
                tiles = level.tile_count(),
                degrees = width / level.tiles_per_side as f64,
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

                let view = tile_view(tile.x, tile.y, tile.zoom, width, size);
                let image = renderer.render(&view)?;
                save_tile(&DynamicImage::ImageRgba8(image), &path, instructions.output_format)?;
                debug!(path = %path.display(), "Tile rendered");
                progress.tile_written();
            }
        }

        Ok(progress.summary())
    }
}

impl TileProcessor for VectorMapProcessor {
    fn name(&self) -> &str {
        "OpenStreetMap"
    }

    fn validate(&self, instructions: &InstructionSet) -> Result<(), ValidationError> {
        validate_osm(instructions)
    }

    fn process(
        &self,
        instructions: &InstructionSet,
        progress: &mut ProgressReporter,
    ) -> Result<RunSummary, TileError> {
        validate_osm(instructions)?;
        let renderer = self.prepare(instructions)?;
        let summary = self.render_tiles(&renderer, instructions, progress)?;
        info!(
            written = summary.written,
            skipped = summary.skipped,
            "Map rendering complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OutputFormat;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DATA: &str = r#"<?xml version="1.0"?>
<osm>
  <node id="1" lat="-10" lon="-10"/>
  <node id="2" lat="-10" lon="10"/>
  <node id="3" lat="10" lon="10"/>
  <node id="4" lat="10" lon="-10"/>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
    <tag k="landuse" v="forest"/>
  </way>
</osm>"#;

    const STYLE: &str = "area[landuse=forest] { fill-color: #008000; }";

    fn setup(style: &str) -> (TempDir, InstructionSet) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("world.osm");
        std::fs::write(&input, DATA).unwrap();
        std::fs::write(dir.path().join("world.osm.mapcss"), style).unwrap();
        let out = dir.path().join("tiles");
        std::fs::create_dir(&out).unwrap();
        let set = InstructionSet::builder(&input, &out)
            .output_size(128)
            .zoom_range(0, 1)
            .map_size(40.0)
            .build();
        (dir, set)
    }

    /// Records every requested view and returns a blank tile.
    struct RecordingRenderer {
        views: Mutex<Vec<RenderView>>,
    }

    impl MapRenderer for RecordingRenderer {
        fn render(&self, view: &RenderView) -> Result<image::RgbaImage, TileError> {
            self.views.lock().unwrap().push(*view);
            Ok(image::RgbaImage::new(view.size, view.size))
        }
    }

    struct FailingRenderer;

    impl MapRenderer for FailingRenderer {
        fn render(&self, _view: &RenderView) -> Result<image::RgbaImage, TileError> {
            Err(TileError::Render("boom".to_string()))
        }
    }

    #[test]
    fn test_zoom_zero_view_is_centred() {
        let view = tile_view(0, 0, 0, 6000.0, 512);
        assert_eq!(view.center, GeoPoint::new(0.0, 0.0));
        assert!((view.span() - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn test_tiles_partition_the_map() {
        let width = 6000.0;
        for zoom in 1..=3u8 {
            let tiles = tiles_per_side(zoom);
            let tile_geo = width / tiles as f64;
            for x in 0..tiles {
                for y in 0..tiles {
                    let view = tile_view(x, y, zoom, width, 256);
                    assert!((view.span() - tile_geo).abs() < 1e-6);
                    let west = view.center.lon - tile_geo / 2.0;
                    let north = view.center.lat + tile_geo / 2.0;
                    assert!((west - (x as f64 * tile_geo - width / 2.0)).abs() < 1e-6);
                    assert!((north - (width / 2.0 - y as f64 * tile_geo)).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_render_tiles_requests_views_in_plan_order() {
        let (_dir, set) = setup(STYLE);
        let renderer = RecordingRenderer {
            views: Mutex::new(Vec::new()),
        };
        let mut progress = ProgressReporter::silent(set.total_tiles());
        let summary = VectorMapProcessor::new()
            .render_tiles(&renderer, &set, &mut progress)
            .unwrap();

        assert_eq!(summary.written, 5);
        let views = renderer.views.lock().unwrap();
        assert_eq!(views.len(), 5);
        // x-major: zoom 1 tile (0, 1) is the south-west quadrant
        assert_eq!(views[2].center, GeoPoint::new(-10.0, -10.0));
        assert!(set.tile_path(1, 1, 1).exists());
    }

    #[test]
    fn test_render_failure_is_fatal() {
        let (_dir, set) = setup(STYLE);
        let mut progress = ProgressReporter::silent(set.total_tiles());
        let err = VectorMapProcessor::new()
            .render_tiles(&FailingRenderer, &set, &mut progress)
            .unwrap_err();
        assert!(matches!(err, TileError::Render(_)));
        assert_eq!(progress.completed(), 0);
    }

    #[test]
    fn test_process_renders_forest() {
        let (_dir, set) = setup(STYLE);
        let mut progress = ProgressReporter::silent(set.total_tiles());
        let summary = VectorMapProcessor::new().process(&set, &mut progress).unwrap();
        assert_eq!(summary, RunSummary { written: 5, skipped: 0 });

        // The forest covers the middle half of the zoom 0 tile
        let tile = image::open(set.tile_path(0, 0, 0)).unwrap().to_rgba8();
        assert_eq!(tile.dimensions(), (128, 128));
        assert_eq!(tile.get_pixel(64, 64).0, [0, 128, 0, 255]);
        assert_eq!(tile.get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_process_with_resize_factor_writes_temp_copy() {
        let (dir, set) = setup(STYLE);
        let set = InstructionSet {
            preprocessor_resize_factor: 2,
            output_format: OutputFormat::Bmp,
            ..set
        };
        let mut progress = ProgressReporter::silent(set.total_tiles());
        VectorMapProcessor::new().process(&set, &mut progress).unwrap();

        let temp = dir.path().join("world.temp");
        assert!(temp.exists());
        let scaled = OsmDocument::open(&temp).unwrap();
        assert_eq!(scaled.node(3).map(|n| (n.lat, n.lon)), Some((20.0, 20.0)));

        // Same relative picture at twice the extent
        let tile = image::open(set.tile_path(0, 0, 0)).unwrap().to_rgba8();
        assert_eq!(tile.get_pixel(64, 64).0, [0, 128, 0, 255]);
    }

    #[test]
    fn test_bad_stylesheet_aborts_before_any_tile() {
        let (_dir, set) = setup("area[landuse=forest] { fill-color: nope; }");
        let mut progress = ProgressReporter::silent(set.total_tiles());
        let err = VectorMapProcessor::new().process(&set, &mut progress).unwrap_err();

        assert!(matches!(err, TileError::Style(_)));
        assert!(!set.tile_path(0, 0, 0).exists());
    }

    #[test]
    fn test_validate_requires_stylesheet() {
        let (dir, set) = setup(STYLE);
        std::fs::remove_file(dir.path().join("world.osm.mapcss")).unwrap();
        assert!(matches!(
            VectorMapProcessor::new().validate(&set),
            Err(ValidationError::StylesheetMissing(_))
        ));
    }
}
