//! Trellogate CLI Library
//!
//! This library exposes the CLI's configuration, terminal capabilities and
//! command implementations for testing.

pub mod commands;
pub mod config;
pub mod terminal;

pub use config::{load_config, CliConfig};
pub use terminal::TerminalLocation;
