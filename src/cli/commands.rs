//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::resource::GroupVersionKind;

/// xpmigrate - Crossplane migration plan generator.
#[derive(Parser, Debug)]
#[command(name = "xpmigrate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "XPMIGRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a migration plan from a directory of manifests.
    Plan {
        /// Directory containing the manifests to migrate.
        #[arg(short, long, default_value = ".")]
        source: PathBuf,

        /// Directory the converted manifests are written to.
        #[arg(short = 'o', long = "output-dir", default_value = "migrated")]
        output_dir: PathBuf,

        /// File the plan is written to.
        #[arg(short, long, default_value = "migration_plan.yaml")]
        plan_file: PathBuf,

        /// Source type identifier (`group/version/kind`) whose composed
        /// templates are left as converted. Empty components match anything.
        #[arg(long = "skip-gvk", value_name = "GROUP/VERSION/KIND")]
        skip_gvks: Vec<GroupVersionKind>,

        /// Fail on composed-template patches the target schema rejects.
        #[arg(long)]
        error_on_invalid_patch_schema: bool,

        /// Seed for generated name suffixes.
        #[arg(long, env = "XPMIGRATE_SEED")]
        seed: Option<u64>,
    },

    /// Validate the migration configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Display a stored migration plan.
    Show {
        /// Plan file to display.
        #[arg(default_value = "migration_plan.yaml")]
        plan_file: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
