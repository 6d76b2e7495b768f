//! Reading and writing ~/.tilecutter/config.ini.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),

    /// `init` would overwrite an existing file
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
}

impl ConfigFile {
    /// Loads ~/.tilecutter/config.ini, or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads `path`, or defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        super::parser::parse_ini(&Ini::load_from_file(path)?)
    }

    /// Writes the commented INI form, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Writes a default config file to `path`. An existing file is only
    /// replaced when `force` is set.
    pub fn init_at(path: &Path, force: bool) -> Result<(), ConfigFileError> {
        if path.exists() && !force {
            return Err(ConfigFileError::AlreadyExists(path.to_path_buf()));
        }
        Self::default().save_to(path)
    }
}

/// The config directory (~/.tilecutter).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilecutter")
}

/// The config file (~/.tilecutter/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LOG_FILE;
    use crate::instructions::DEFAULT_OUTPUT_SIZE;
    use crate::plan::OutputFormat;
    use crate::processor::BackendKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.tiles.size, DEFAULT_OUTPUT_SIZE);
        assert_eq!(config.tiles.format, OutputFormat::Png);
        assert_eq!((config.tiles.min_zoom, config.tiles.max_zoom), (0, 4));
        assert_eq!(config.tiles.backend, BackendKind::Direct);
        assert_eq!(config.batch.max_args_length, 6000);
        assert_eq!(config.osm.resize_factor, 1);
        assert!(config.logging.file.ends_with(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("nonexistent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        ConfigFile::init_at(&path, false).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());

        std::fs::write(&path, "[tiles]\nsize = 256\n").unwrap();
        let err = ConfigFile::init_at(&path, false).unwrap_err();
        assert!(matches!(err, ConfigFileError::AlreadyExists(_)));
        assert_eq!(ConfigFile::load_from(&path).unwrap().tiles.size, 256);

        ConfigFile::init_at(&path, true).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_config_path_layout() {
        assert!(config_file_path().ends_with(".tilecutter/config.ini"));
    }
}
