//! User configuration stored in `~/.tilecutter/config.ini`.
//!
//! The file only supplies defaults: every value can be overridden per run on
//! the command line.
//!
//! # Example
//!
//! ```no_run
//! use tilecutter::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let instructions = config.instructions("map.png", "tiles").build();
//! # Ok::<(), tilecutter::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
pub use writer::to_config_string;
