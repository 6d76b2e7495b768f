//! Default values and the `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::instructions::{
    DEFAULT_MAP_SIZE, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_OUTPUT_SIZE,
};
use crate::plan::OutputFormat;
use crate::processor::BackendKind;

pub const DEFAULT_RESIZE_FACTOR: u32 = 1;

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "tilecutter.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();

        Self {
            tiles: TileSettings {
                size: DEFAULT_OUTPUT_SIZE,
                format: OutputFormat::Png,
                min_zoom: DEFAULT_MIN_ZOOM,
                max_zoom: DEFAULT_MAX_ZOOM,
                skip_existing: false,
                backend: BackendKind::Direct,
            },
            batch: BatchSettings {
                program: PathBuf::from(crate::batch::DEFAULT_PROGRAM),
                max_args_length: crate::batch::DEFAULT_MAX_ARGS_LENGTH,
            },
            osm: OsmSettings {
                resize_factor: DEFAULT_RESIZE_FACTOR,
                map_size: DEFAULT_MAP_SIZE,
            },
            logging: LoggingSettings {
                file: config_dir.join("logs").join(DEFAULT_LOG_FILE),
            },
        }
    }
}
