//! CLI module for the xpmigrate tool.
//!
//! This module provides the command-line interface for generating and
//! inspecting Crossplane migration plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
