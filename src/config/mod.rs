//! Configuration module for the migration planner.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `xpmigrate.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of rewrites and skip lists

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_ERROR_ON_INVALID_PATCH_SCHEMA, ENV_SEED, find_config_file,
};
pub use spec::MigrationConfig;
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
