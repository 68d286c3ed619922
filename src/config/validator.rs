//! Configuration validation for migration settings.
//!
//! This module checks a migration configuration for rewrites that cannot
//! work and skip entries that are likely mistakes, before any manifest is
//! read.

use crate::error::{ConfigError, MigrationError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::MigrationConfig;
use crate::registry::ApiRewrite;
use crate::resource::GroupVersionKind;

/// Validator for migration configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a migration configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &MigrationConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(MigrationError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }
        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &MigrationConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_rewrites(&config.rewrites, &mut result);
        Self::validate_skip_gvks(&config.skip_gvks, &mut result);
        result
    }

    /// Validates API rewrites.
    fn validate_rewrites(rewrites: &[ApiRewrite], result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (i, rewrite) in rewrites.iter().enumerate() {
            let field = format!("rewrites[{i}]");

            // An empty group is the core group, so only version and kind are required
            if !rewrite.from.is_complete() {
                result.errors.push(ValidationError {
                    field: format!("{field}.from"),
                    message: format!("Rewrite source '{}' must name a version and a kind", rewrite.from),
                });
            }

            if !seen.insert(&rewrite.from) {
                result.errors.push(ValidationError {
                    field: format!("{field}.from"),
                    message: format!("Type identifier '{}' is rewritten more than once", rewrite.from),
                });
            }

            if rewrite.target() == rewrite.from {
                result.errors.push(ValidationError {
                    field: format!("{field}.to"),
                    message: format!("Rewrite of '{}' does not change the type identifier", rewrite.from),
                });
            }
        }
    }

    /// Validates skip-list entries.
    fn validate_skip_gvks(skip_gvks: &[GroupVersionKind], result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (i, gvk) in skip_gvks.iter().enumerate() {
            if gvk.is_zero() {
                result.warnings.push(format!(
                    "skipGvks[{i}] matches every type identifier; no composed template will be defaulted"
                ));
            }
            if !seen.insert(gvk) {
                result
                    .warnings
                    .push(format!("skipGvks[{i}] duplicates an earlier entry: {gvk}"));
            }
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
