//! tilecutter - slice large square maps into zoomable tile pyramids
//!
//! A source image (or an OpenStreetMap extract plus MapCSS stylesheet) is cut
//! into `2^z × 2^z` square tiles for every zoom level `z` in a range, ready to
//! be served to a slippy-map viewer. Tiles are named
//! `{name}.{zoom}.{x}.{y}.{ext}`.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilecutter::{create_processor, BackendKind, BackendSettings, InstructionSet, TileJob};
//!
//! let instructions = InstructionSet::builder("map.png", "tiles")
//!     .output_size(256)
//!     .zoom_range(0, 4)
//!     .build();
//!
//! let processor = create_processor(BackendKind::Direct, &BackendSettings::default());
//! let mut handle = TileJob::start(processor, instructions)?;
//! while let Some(event) = handle.next_progress().await {
//!     println!("{}/{}", event.completed, event.total);
//! }
//! let summary = handle.wait().await?;
//! ```
//!
//! # Backends
//!
//! - [`raster`] crops and resizes in-process with the `image` crate
//! - [`batch`] drives an ImageMagick-compatible converter in batches
//! - [`vector`] renders OSM data styled with [`mapcss`]

pub mod batch;
pub mod config;
pub mod error;
pub mod instructions;
pub mod job;
pub mod logging;
pub mod mapcss;
pub mod metadata;
pub mod osm;
pub mod plan;
pub mod processor;
pub mod progress;
pub mod raster;
pub mod render;
pub mod vector;
pub mod viewer;

pub use error::{ErrorKind, TileError, ValidationError};
pub use instructions::{InstructionSet, InstructionSetBuilder};
pub use job::{run_blocking, JobHandle, TileJob};
pub use metadata::{dimensions_of, Dimensions};
pub use plan::{OutputFormat, TileDescriptor, TilePlan};
pub use processor::{create_processor, BackendKind, BackendSettings, TileProcessor};
pub use progress::{ProgressEvent, RunSummary};

/// Version of the tilecutter library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
