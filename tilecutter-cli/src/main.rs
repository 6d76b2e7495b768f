//! tilecutter CLI - Command-line interface
//!
//! Cuts a square map image (or an OSM extract) into a zoomable tile pyramid.

mod commands;
mod error;
mod progress;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::cut::CutArgs;

#[derive(Parser)]
#[command(name = "tilecutter")]
#[command(version = tilecutter::VERSION)]
#[command(about = "Cut square maps into zoomable tile pyramids", long_about = None)]
struct Cli {
    /// Verbose logging; also logs every external converter command line
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the tiles of one input
    Cut(CutArgs),

    /// Show an image's dimensions and the tile counts it supports
    Inspect {
        /// Image to inspect (PNG, JPEG, BMP or GIF)
        image: std::path::PathBuf,

        /// Highest zoom level to list
        #[arg(short = 'z', long, default_value_t = tilecutter::instructions::DEFAULT_MAX_ZOOM)]
        max_zoom: u8,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Cut(args) => commands::cut::run(args, cli.debug),
        Commands::Inspect { image, max_zoom } => commands::inspect::run(&image, max_zoom),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
