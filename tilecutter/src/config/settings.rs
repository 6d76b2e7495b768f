//! Settings structs, one per `[section]` of the INI file.
//!
//! Pure data; parsing lives in `parser`, serialization in `writer`.

use std::path::{Path, PathBuf};

use crate::instructions::{InstructionSet, InstructionSetBuilder};
use crate::plan::OutputFormat;
use crate::processor::{BackendKind, BackendSettings};

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub tiles: TileSettings,
    pub batch: BatchSettings,
    pub osm: OsmSettings,
    pub logging: LoggingSettings,
}

/// `[tiles]`: defaults for every run.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    /// Tile edge in pixels
    pub size: u32,
    pub format: OutputFormat,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub skip_existing: bool,
    pub backend: BackendKind,
}

/// `[batch]`: the external converter.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Converter executable, looked up on PATH if relative
    pub program: PathBuf,
    /// Upper bound on the argument length of one invocation
    pub max_args_length: usize,
}

/// `[osm]`: map rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmSettings {
    pub resize_factor: u32,
    /// Extent of the source map in degrees
    pub map_size: f64,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Instruction builder seeded with the configured defaults.
    pub fn instructions(
        &self,
        input: impl AsRef<Path>,
        output_directory: impl AsRef<Path>,
    ) -> InstructionSetBuilder {
        InstructionSet::builder(input.as_ref(), output_directory.as_ref())
            .output_size(self.tiles.size)
            .output_format(self.tiles.format)
            .zoom_range(self.tiles.min_zoom, self.tiles.max_zoom)
            .skip_existing(self.tiles.skip_existing)
            .preprocessor_resize_factor(self.osm.resize_factor)
            .map_size(self.osm.map_size)
    }

    pub fn backend_settings(&self, debug: bool) -> BackendSettings {
        BackendSettings {
            program: self.batch.program.clone(),
            max_args_length: self.batch.max_args_length,
            debug,
        }
    }
}
