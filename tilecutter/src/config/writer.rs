//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[tiles]
; Tile edge in pixels: a power of two, at least 128 (default: 512)
size = {}
; Output image format: png, jpg, bmp or gif (default: png)
format = {}
; Zoom levels to generate. Zoom z has 2^z x 2^z tiles.
min_zoom = {}
max_zoom = {}
; Leave tiles that already exist untouched (default: false)
skip_existing = {}
; Tiling backend:
;   direct - crop and resize in-process (default)
;   batch  - batched calls to an ImageMagick-compatible converter
;   osm    - render an OpenStreetMap extract with its <input>.mapcss stylesheet
backend = {}

[batch]
; Converter executable (default: convert, looked up on PATH)
program = {}
; Maximum combined argument length of one converter call (default: 6000)
max_args_length = {}

[osm]
; Multiply node coordinates by this factor before rendering (default: 1)
resize_factor = {}
; Extent of the map in degrees before resizing (default: 6000)
map_size = {}

[logging]
; Log file, truncated at the start of every run
file = {}
"#,
        config.tiles.size,
        config.tiles.format,
        config.tiles.min_zoom,
        config.tiles.max_zoom,
        config.tiles.skip_existing,
        config.tiles.backend,
        path_to_string(&config.batch.program),
        config.batch.max_args_length,
        config.osm.resize_factor,
        config.osm.map_size,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use crate::plan::OutputFormat;
    use crate::processor::BackendKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.tiles.size = 1024;
        config.tiles.format = OutputFormat::Gif;
        config.tiles.min_zoom = 1;
        config.tiles.max_zoom = 7;
        config.tiles.skip_existing = true;
        config.tiles.backend = BackendKind::Osm;
        config.batch.program = PathBuf::from("/usr/local/bin/magick");
        config.osm.resize_factor = 3;
        config.osm.map_size = 1234.5;
        config.logging.file = temp_dir.path().join("run.log");

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_file_is_commented() {
        let text = super::to_config_string(&ConfigFile::default());
        assert!(text.contains("[tiles]"));
        assert!(text.contains("backend = direct"));
        assert!(text.contains("format = png"));
        assert!(text.lines().any(|l| l.starts_with("; Tiling backend")));
    }
}
