//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`cut`] - Main command (generate a tile pyramid)
//! - [`inspect`] - Image dimensions and tile counts

pub mod common;
pub mod config;
pub mod cut;
pub mod inspect;
