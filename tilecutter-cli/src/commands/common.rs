//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use tilecutter::{BackendKind, OutputFormat};

/// Backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum BackendType {
    /// Crop and resize in-process (no external tools)
    Direct,
    /// Drive an ImageMagick-compatible converter in batches
    Batch,
    /// Render an OpenStreetMap extract styled by <input>.mapcss
    Osm,
}

impl From<BackendType> for BackendKind {
    fn from(backend: BackendType) -> Self {
        match backend {
            BackendType::Direct => BackendKind::Direct,
            BackendType::Batch => BackendKind::Batch,
            BackendType::Osm => BackendKind::Osm,
        }
    }
}

/// Tile image format for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum FormatType {
    Png,
    Bmp,
    #[value(alias = "jpeg")]
    Jpg,
    Gif,
}

impl From<FormatType> for OutputFormat {
    fn from(format: FormatType) -> Self {
        match format {
            FormatType::Png => OutputFormat::Png,
            FormatType::Bmp => OutputFormat::Bmp,
            FormatType::Jpg => OutputFormat::Jpeg,
            FormatType::Gif => OutputFormat::Gif,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_conversion() {
        assert_eq!(BackendKind::from(BackendType::Direct), BackendKind::Direct);
        assert_eq!(BackendKind::from(BackendType::Batch), BackendKind::Batch);
        assert_eq!(BackendKind::from(BackendType::Osm), BackendKind::Osm);
    }

    #[test]
    fn test_format_parses_jpeg_alias() {
        let format = FormatType::from_str("jpeg", true).unwrap();
        assert_eq!(OutputFormat::from(format), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::Jpeg.extension(), ".jpg");
    }
}
