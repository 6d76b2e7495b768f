//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::instructions::{is_valid_size, MIN_OUTPUT_SIZE};
use crate::plan::MAX_ZOOM;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("size") {
            let size: u32 = parse_number(v, "tiles", "size", "must be a positive integer")?;
            if size < MIN_OUTPUT_SIZE || !is_valid_size(size) {
                return Err(invalid(
                    "tiles",
                    "size",
                    v,
                    "must be a power of two, at least 128",
                ));
            }
            config.tiles.size = size;
        }
        if let Some(v) = section.get("format") {
            config.tiles.format = v
                .parse()
                .map_err(|_| invalid("tiles", "format", v, "must be one of: png, jpg, bmp, gif"))?;
        }
        if let Some(v) = section.get("min_zoom") {
            config.tiles.min_zoom = parse_zoom(v, "min_zoom")?;
        }
        if let Some(v) = section.get("max_zoom") {
            config.tiles.max_zoom = parse_zoom(v, "max_zoom")?;
        }
        if let Some(v) = section.get("skip_existing") {
            config.tiles.skip_existing = parse_bool(v);
        }
        if let Some(v) = section.get("backend") {
            config.tiles.backend = v
                .parse()
                .map_err(|_| invalid("tiles", "backend", v, "must be one of: direct, batch, osm"))?;
        }
        if config.tiles.min_zoom > config.tiles.max_zoom {
            return Err(invalid(
                "tiles",
                "min_zoom",
                &config.tiles.min_zoom.to_string(),
                "must not exceed max_zoom",
            ));
        }
    }

    // [batch] section
    if let Some(section) = ini.section(Some("batch")) {
        if let Some(v) = section.get("program") {
            let v = v.trim();
            if !v.is_empty() {
                config.batch.program = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("max_args_length") {
            config.batch.max_args_length =
                parse_number(v, "batch", "max_args_length", "must be a positive integer")?;
            if config.batch.max_args_length == 0 {
                return Err(invalid("batch", "max_args_length", v, "must be a positive integer"));
            }
        }
    }

    // [osm] section
    if let Some(section) = ini.section(Some("osm")) {
        if let Some(v) = section.get("resize_factor") {
            config.osm.resize_factor =
                parse_number(v, "osm", "resize_factor", "must be a positive integer")?;
            if config.osm.resize_factor == 0 {
                return Err(invalid("osm", "resize_factor", v, "must be a positive integer"));
            }
        }
        if let Some(v) = section.get("map_size") {
            let size: f64 = parse_number(v, "osm", "map_size", "must be a positive number")?;
            if !(size.is_finite() && size > 0.0) {
                return Err(invalid("osm", "map_size", v, "must be a positive number"));
            }
            config.osm.map_size = size;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_zoom(value: &str, key: &str) -> Result<u8, ConfigFileError> {
    let reason = format!("must be an integer from 0 to {}", MAX_ZOOM);
    let zoom: u8 = parse_number(value, "tiles", key, &reason)?;
    if zoom > MAX_ZOOM {
        return Err(invalid("tiles", key, value, &reason));
    }
    Ok(zoom)
}

/// Parse a boolean value from config.
///
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OutputFormat;
    use crate::processor::BackendKind;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_partial_config() {
        let config = load(
            r#"
[tiles]
size = 256
format = jpg
max_zoom = 6
skip_existing = yes

[osm]
map_size = 3000.5
"#,
        )
        .unwrap();

        assert_eq!(config.tiles.size, 256);
        assert_eq!(config.tiles.format, OutputFormat::Jpeg);
        assert_eq!(config.tiles.max_zoom, 6);
        assert!(config.tiles.skip_existing);
        assert_eq!(config.osm.map_size, 3000.5);

        // Untouched values keep their defaults
        let default = ConfigFile::default();
        assert_eq!(config.tiles.min_zoom, default.tiles.min_zoom);
        assert_eq!(config.batch, default.batch);
        assert_eq!(config.osm.resize_factor, default.osm.resize_factor);
    }

    #[test]
    fn test_backend_and_batch_settings() {
        let config = load(
            r#"
[tiles]
backend = magick

[batch]
program = /opt/im/bin/convert
max_args_length = 30000
"#,
        )
        .unwrap();

        assert_eq!(config.tiles.backend, BackendKind::Batch);
        assert_eq!(config.batch.program, PathBuf::from("/opt/im/bin/convert"));
        assert_eq!(config.batch.max_args_length, 30000);
    }

    #[test]
    fn test_invalid_size_rejected() {
        let err = load("[tiles]\nsize = 300\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, value, .. } => {
                assert_eq!((section.as_str(), key.as_str(), value.as_str()), ("tiles", "size", "300"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(load("[tiles]\nsize = 64\n").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load("[tiles]\nformat = tiff\n").is_err());
        assert!(load("[tiles]\nbackend = gdi\n").is_err());
        assert!(load("[tiles]\nmax_zoom = 40\n").is_err());
        assert!(load("[tiles]\nmin_zoom = 5\nmax_zoom = 2\n").is_err());
        assert!(load("[osm]\nresize_factor = 0\n").is_err());
        assert!(load("[osm]\nmap_size = -1\n").is_err());
        assert!(load("[batch]\nmax_args_length = lots\n").is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        for v in ["true", "TRUE", "yes", "1", "On"] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["false", "no", "0", "off", "", "maybe"] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs/tilecutter.log");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs/tilecutter.log"));
        }
        assert_eq!(expand_tilde("/var/log/t.log"), PathBuf::from("/var/log/t.log"));
    }
}
