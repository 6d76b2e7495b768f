//! Error types shared by every tile backend.
//!
//! Validation problems are reported before any work starts and never leave
//! side effects behind. Everything else aborts a run that may already have
//! written tiles; those stay on disk.

use std::path::PathBuf;
use thiserror::Error;

use crate::mapcss::StyleError;
use crate::osm::OsmError;

/// Pre-flight validation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Input path does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("Output directory does not exist: {0}")]
    OutputDirectoryMissing(PathBuf),

    #[error("Invalid image format: cannot determine dimensions of {0}")]
    UnknownImageFormat(PathBuf),

    #[error("Input image must be square (got {width}x{height})")]
    NotSquare { width: u32, height: u32 },

    #[error("The output size must be 128, 256, 512, 1024, ... (got {0})")]
    InvalidOutputSize(u32),

    #[error("Invalid zoom range {min}..={max}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error("Zoom level {zoom} is too deep for a {side}px source image")]
    ZoomTooDeep { side: u32, zoom: u8 },

    #[error("Input file is not a *.osm file: {0}")]
    NotOsmFile(PathBuf),

    #[error("*.mapcss file not found: {0}")]
    StylesheetMissing(PathBuf),

    #[error("Preprocessor resize factor must be at least 1 (got {0})")]
    InvalidResizeFactor(u32),

    #[error("Map size must be a positive number (got {0})")]
    InvalidMapSize(f64),

    #[error("Output name must not be empty")]
    EmptyOutputName,
}

/// Coarse error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    IoFailure,
    ExternalToolFailure,
    RenderFailure,
    Cancelled,
    Internal,
}

/// Terminal error of a tiling run.
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("External tool '{program}' failed: {message}")]
    ExternalTool { program: String, message: String },

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Osm(#[from] OsmError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("Tiling worker failed: {0}")]
    Worker(String),
}

impl TileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TileError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        TileError::Image {
            path: path.into(),
            source,
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileError::Invalid(_) => ErrorKind::InvalidInput,
            TileError::Io { .. }
            | TileError::Image { .. }
            | TileError::Osm(OsmError::Io { .. } | OsmError::Write { .. }) => ErrorKind::IoFailure,
            TileError::ExternalTool { .. } => ErrorKind::ExternalToolFailure,
            TileError::Render(_) | TileError::Osm(_) | TileError::Style(_) => {
                ErrorKind::RenderFailure
            }
            TileError::Cancelled => ErrorKind::Cancelled,
            TileError::Worker(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_human_readable() {
        let err = ValidationError::NotSquare {
            width: 100,
            height: 50,
        };
        assert_eq!(err.to_string(), "Input image must be square (got 100x50)");
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err = TileError::from(ValidationError::InvalidOutputSize(100));
        assert_eq!(
            err.to_string(),
            "The output size must be 128, 256, 512, 1024, ... (got 100)"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_error_kinds() {
        let io = TileError::io(
            "/tmp/x.png",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(io.kind(), ErrorKind::IoFailure);
        assert!(io.to_string().contains("disk full"));

        let tool = TileError::ExternalTool {
            program: "convert".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(tool.kind(), ErrorKind::ExternalToolFailure);

        assert_eq!(TileError::Render("x".into()).kind(), ErrorKind::RenderFailure);

        let temp_write = TileError::Osm(OsmError::Write {
            path: PathBuf::from("/tmp/world.temp"),
            message: "disk full".to_string(),
        });
        assert_eq!(temp_write.kind(), ErrorKind::IoFailure);
        let unreadable = TileError::Osm(OsmError::Io {
            path: PathBuf::from("/tmp/world.osm"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        });
        assert_eq!(unreadable.kind(), ErrorKind::IoFailure);
        let malformed = TileError::Osm(OsmError::Value("lat".to_string()));
        assert_eq!(malformed.kind(), ErrorKind::RenderFailure);
        assert_eq!(TileError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
