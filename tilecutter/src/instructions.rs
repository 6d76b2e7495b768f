//! Parameters of a single tiling run and their shared validation.

use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::metadata::{dimensions_of, Dimensions};
use crate::plan::{OutputFormat, MAX_ZOOM};

/// Smallest accepted tile edge in pixels.
pub const MIN_OUTPUT_SIZE: u32 = 128;

pub const DEFAULT_OUTPUT_SIZE: u32 = 512;
pub const DEFAULT_MIN_ZOOM: u8 = 0;
pub const DEFAULT_MAX_ZOOM: u8 = 4;
pub const DEFAULT_MAP_SIZE: f64 = 6000.0;

/// Everything one run needs. Built once, read by exactly one processor.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionSet {
    pub input_path: PathBuf,
    pub output_directory: PathBuf,
    pub output_name: String,
    pub output_size: u32,
    pub output_format: OutputFormat,
    pub minimum_zoom: u8,
    pub maximum_zoom: u8,
    pub skip_existing: bool,
    /// OSM backend only: factor applied to node coordinates before rendering.
    pub preprocessor_resize_factor: u32,
    /// OSM backend only: geographic extent of the source map.
    pub map_size: f64,
}

impl InstructionSet {
    pub fn builder(input: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> InstructionSetBuilder {
        InstructionSetBuilder::new(input.into(), output_directory.into())
    }

    /// Output path of the tile at `(zoom, x, y)`.
    pub fn tile_path(&self, zoom: u8, x: u32, y: u32) -> PathBuf {
        crate::plan::tile_path(
            &self.output_directory,
            &self.output_name,
            zoom,
            x,
            y,
            self.output_format,
        )
    }

    pub fn total_tiles(&self) -> u64 {
        crate::plan::total_tiles(self.minimum_zoom, self.maximum_zoom)
    }

    /// Stylesheet expected next to an OSM extract (`<input>.mapcss`).
    pub fn stylesheet_path(&self) -> PathBuf {
        let mut path = self.input_path.clone().into_os_string();
        path.push(".mapcss");
        PathBuf::from(path)
    }
}

/// Builder for [`InstructionSet`].
#[derive(Debug, Clone)]
pub struct InstructionSetBuilder {
    instructions: InstructionSet,
}

impl InstructionSetBuilder {
    fn new(input_path: PathBuf, output_directory: PathBuf) -> Self {
        let output_name = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            instructions: InstructionSet {
                input_path,
                output_directory,
                output_name,
                output_size: DEFAULT_OUTPUT_SIZE,
                output_format: OutputFormat::default(),
                minimum_zoom: DEFAULT_MIN_ZOOM,
                maximum_zoom: DEFAULT_MAX_ZOOM,
                skip_existing: false,
                preprocessor_resize_factor: 1,
                map_size: DEFAULT_MAP_SIZE,
            },
        }
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.instructions.output_name = name.into();
        self
    }

    pub fn output_size(mut self, size: u32) -> Self {
        self.instructions.output_size = size;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.instructions.output_format = format;
        self
    }

    pub fn zoom_range(mut self, min: u8, max: u8) -> Self {
        self.instructions.minimum_zoom = min;
        self.instructions.maximum_zoom = max;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.instructions.skip_existing = skip;
        self
    }

    pub fn preprocessor_resize_factor(mut self, factor: u32) -> Self {
        self.instructions.preprocessor_resize_factor = factor;
        self
    }

    pub fn map_size(mut self, size: f64) -> Self {
        self.instructions.map_size = size;
        self
    }

    pub fn build(self) -> InstructionSet {
        self.instructions
    }
}

/// True if `size` is a power of two no smaller than 2.
pub fn is_valid_size(size: u32) -> bool {
    let mut s: u64 = 2;
    while s < size as u64 {
        s *= 2;
    }
    size as u64 == s
}

fn require_output_directory(instructions: &InstructionSet) -> Result<(), ValidationError> {
    if !instructions.output_directory.is_dir() {
        return Err(ValidationError::OutputDirectoryMissing(
            instructions.output_directory.clone(),
        ));
    }
    Ok(())
}

/// Name, size and zoom checks. The output directory is checked separately.
fn validate_common(instructions: &InstructionSet) -> Result<(), ValidationError> {
    if instructions.output_name.is_empty() {
        return Err(ValidationError::EmptyOutputName);
    }
    if !is_valid_size(instructions.output_size) || instructions.output_size < MIN_OUTPUT_SIZE {
        return Err(ValidationError::InvalidOutputSize(instructions.output_size));
    }
    if instructions.minimum_zoom > instructions.maximum_zoom || instructions.maximum_zoom > MAX_ZOOM {
        return Err(ValidationError::InvalidZoomRange {
            min: instructions.minimum_zoom,
            max: instructions.maximum_zoom,
        });
    }
    Ok(())
}

/// Checks shared by the raster backends. Returns the source dimensions.
pub fn validate_raster(instructions: &InstructionSet) -> Result<Dimensions, ValidationError> {
    if !instructions.input_path.is_file() {
        return Err(ValidationError::InputMissing(instructions.input_path.clone()));
    }
    require_output_directory(instructions)?;

    let dims = dimensions_of(&instructions.input_path)
        .ok_or_else(|| ValidationError::UnknownImageFormat(instructions.input_path.clone()))?;
    if !dims.is_square() {
        return Err(ValidationError::NotSquare {
            width: dims.width,
            height: dims.height,
        });
    }

    validate_common(instructions)?;

    if dims.width >> instructions.maximum_zoom == 0 {
        return Err(ValidationError::ZoomTooDeep {
            side: dims.width,
            zoom: instructions.maximum_zoom,
        });
    }

    Ok(dims)
}

/// Checks for the vector (OSM) backend.
pub fn validate_osm(instructions: &InstructionSet) -> Result<(), ValidationError> {
    let input = &instructions.input_path;
    if !input.is_file() {
        return Err(ValidationError::InputMissing(input.clone()));
    }
    if !has_osm_extension(input) {
        return Err(ValidationError::NotOsmFile(input.clone()));
    }
    let stylesheet = instructions.stylesheet_path();
    if !stylesheet.is_file() {
        return Err(ValidationError::StylesheetMissing(stylesheet));
    }
    require_output_directory(instructions)?;
    validate_common(instructions)?;

    if instructions.preprocessor_resize_factor < 1 {
        return Err(ValidationError::InvalidResizeFactor(
            instructions.preprocessor_resize_factor,
        ));
    }
    if !(instructions.map_size.is_finite() && instructions.map_size > 0.0) {
        return Err(ValidationError::InvalidMapSize(instructions.map_size));
    }
    Ok(())
}

fn has_osm_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "osm")
}
