//! Configuration parser for loading migration settings.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with environment values taking precedence.

use crate::error::{ConfigError, MigrationError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::spec::MigrationConfig;

/// Environment variable overriding `errorOnInvalidPatchSchema`.
pub const ENV_ERROR_ON_INVALID_PATCH_SCHEMA: &str = "XPMIGRATE_ERROR_ON_INVALID_PATCH_SCHEMA";

/// Environment variable overriding `seed`.
pub const ENV_SEED: &str = "XPMIGRATE_SEED";

/// Configuration parser for loading migration configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<MigrationConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(MigrationError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<MigrationConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(MigrationConfig::default());
        }

        let config: MigrationConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            MigrationError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration with {} rewrites and {} CRD files",
            config.rewrites.len(),
            config.crds.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<MigrationConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_env_overrides(config: &mut MigrationConfig) -> Result<()> {
        if let Ok(value) = std::env::var(ENV_ERROR_ON_INVALID_PATCH_SCHEMA) {
            debug!("Overriding errorOnInvalidPatchSchema from environment");
            config.error_on_invalid_patch_schema = parse_bool(&value).ok_or_else(|| {
                MigrationError::Config(ConfigError::validation(
                    format!("expected true or false, got '{value}'"),
                    ENV_ERROR_ON_INVALID_PATCH_SCHEMA,
                ))
            })?;
        }

        if let Ok(value) = std::env::var(ENV_SEED) {
            debug!("Overriding seed from environment");
            let seed = value.parse::<u64>().map_err(|e| {
                MigrationError::Config(ConfigError::validation(
                    format!("invalid seed '{value}': {e}"),
                    ENV_SEED,
                ))
            })?;
            config.seed = Some(seed);
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                MigrationError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Returns the directory relative paths in the configuration resolve against.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.base_path.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "xpmigrate.yaml",
    "xpmigrate.yml",
    "migration.yaml",
    "migration.yml",
];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    warn!("No configuration file found above {}", start.display());
    Err(MigrationError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
