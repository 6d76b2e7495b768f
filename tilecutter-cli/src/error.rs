//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use tilecutter::config::ConfigFileError;
use tilecutter::{ErrorKind, TileError, ValidationError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Bad command-line input caught before any work starts
    Usage(String),
    /// Failed to create the output directory
    OutputDirectory {
        path: String,
        error: std::io::Error,
    },
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// The tiling run failed
    Tiling(TileError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Tiling(e) if e.kind() == ErrorKind::ExternalToolFailure => {
                eprintln!();
                eprintln!("The batch backend needs an ImageMagick-compatible converter:");
                eprintln!("  1. Install ImageMagick (e.g. sudo apt install imagemagick)");
                eprintln!("  2. Or point to it with --magick /path/to/convert");
                eprintln!("  3. Or set [batch] program in the config file");
            }
            CliError::Tiling(TileError::Invalid(ValidationError::StylesheetMissing(_))) => {
                eprintln!();
                eprintln!("OSM input needs a MapCSS stylesheet next to it named <input>.mapcss");
            }
            CliError::Tiling(TileError::Invalid(ValidationError::InvalidOutputSize(_))) => {
                eprintln!();
                eprintln!("Pick a tile size of 128, 256, 512, 1024, ... with --size");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the file shown by: tilecutter config path");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::OutputDirectory { path, error } => {
                write!(f, "Failed to create output directory '{}': {}", path, error)
            }
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Tiling(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::OutputDirectory { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            CliError::Tiling(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<TileError> for CliError {
    fn from(e: TileError) -> Self {
        CliError::Tiling(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiling_error_message_passes_through() {
        let err = CliError::from(TileError::Cancelled);
        assert_eq!(err.to_string(), "Processing was cancelled");
    }

    #[test]
    fn test_config_error_conversion() {
        let err = CliError::from(ConfigFileError::WriteError("disk full".to_string()));
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
