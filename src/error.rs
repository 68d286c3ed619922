//! Error types for the migration plan generator.
//!
//! This module provides the error hierarchy for every stage of plan
//! generation: reading manifests from a source, running converters, writing
//! converted objects to a target, and loading the generator configuration.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for migration plan generation.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source failed while iterating manifests.
    #[error("failed to generate migration plan: could not {operation} from source: {source}")]
    Source {
        /// Which source call failed.
        operation: SourceOperation,
        /// Error reported by the source.
        #[source]
        source: SourceError,
    },

    /// A resource, composition or configuration could not be converted.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A converter produced an invalid result.
    #[error("Converter contract violation: {0}")]
    Contract(#[from] ContractViolation),

    /// The target rejected a converted object.
    #[error("failed to output migrated {output} '{name}': {source}")]
    Output {
        /// Kind of object that was being written.
        output: OutputKind,
        /// Name of the object.
        name: String,
        /// Error reported by the target.
        #[source]
        source: TargetError,
    },

    /// A generation stage failed.
    #[error("{stage}: {source}")]
    Stage {
        /// The stage that failed.
        stage: Stage,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Converter registry errors.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Plan persistence errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Source calls that can fail during iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    /// Opening the source.
    Open,
    /// Checking whether another object is available.
    HasNext,
    /// Fetching the next object.
    Next,
}

/// Kinds of converted objects written to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// A converted managed resource.
    Resource,
    /// A migrated composition.
    Composition,
    /// An edited composite resource.
    Composite,
    /// An edited claim.
    Claim,
    /// A converted package configuration.
    Configuration,
}

/// Generation stages used to give failures context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Converting a package configuration.
    MigrateConfiguration {
        /// Name of the configuration.
        name: String,
    },
    /// Converting a composition.
    MigrateComposition {
        /// Name of the composition.
        name: String,
    },
    /// Converting a managed resource.
    MigrateResource,
    /// Rewriting composite references.
    EditComposites,
    /// Rewriting claim references.
    EditClaims,
}

/// Errors reported by manifest sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A manifest could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A manifest could not be parsed.
    #[error("failed to parse {location}: {message}")]
    Parse {
        /// File or document location.
        location: String,
        /// Description of the parse error.
        message: String,
    },

    /// `next` was called on an exhausted source.
    #[error("source is exhausted")]
    Exhausted,

    /// Any other source failure.
    #[error("{0}")]
    Other(String),
}

/// Errors reported by targets.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The object could not be written.
    #[error("failed to write {path}: {message}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The object could not be serialized.
    #[error("failed to serialize object: {message}")]
    Serialize {
        /// Description of the serialization error.
        message: String,
    },

    /// Any other target failure.
    #[error("{0}")]
    Other(String),
}

/// Error returned by converter plugins.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConverterError {
    /// Description of the failure.
    pub message: String,
}

/// Conversion failures, always tied to the object being converted.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A resource converter failed.
    #[error("failed to migrate resource '{name}': {source}")]
    Resource {
        /// Name of the resource.
        name: String,
        /// Error from the converter.
        #[source]
        source: ConverterError,
    },

    /// A patch-set converter failed.
    #[error("failed to call patch-set converter on composition '{composition}': {source}")]
    PatchSets {
        /// Name of the composition.
        composition: String,
        /// Error from the converter.
        #[source]
        source: ConverterError,
    },

    /// A composed-template converter failed.
    #[error("failed to migrate the composed templates of composition '{composition}': {source}")]
    ComposedTemplate {
        /// Name of the composition.
        composition: String,
        /// Error from the converter.
        #[source]
        source: ConverterError,
    },

    /// A configuration converter failed.
    #[error("failed to call converter on configuration '{name}': {source}")]
    Configuration {
        /// Name of the configuration.
        name: String,
        /// Error from the converter.
        #[source]
        source: ConverterError,
    },

    /// An object could not be decoded into its typed form.
    #[error("failed to decode {what} '{name}': {message}")]
    Decode {
        /// What was being decoded (composition, configuration, template base).
        what: &'static str,
        /// Name of the object.
        name: String,
        /// Description of the decode error.
        message: String,
    },

    /// A composed-template patch does not conform to the target schema.
    #[error("patch on '{field_path}' of template '{template}' in composition '{composition}' does not conform to {target}")]
    InvalidPatch {
        /// Name of the composition.
        composition: String,
        /// Name of the composed template.
        template: String,
        /// Offending field path.
        field_path: String,
        /// Type identifier of the migration target.
        target: String,
    },

    /// A cross-reference field could not be rewritten.
    #[error("failed to rewrite references of '{name}': {message}")]
    InvalidReference {
        /// Name of the object being edited.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

/// Violations of the converter contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    /// A produced resource lacks its type identifier.
    #[error("resource converted from '{parent}' is missing its type identifier; converters must set apiVersion and kind on any resource they newly generate")]
    MissingTypeIdentifier {
        /// Name of the resource the converter was called with.
        parent: String,
    },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A type identifier pattern could not be parsed.
    #[error("Invalid type identifier '{value}': expected group/version/kind")]
    InvalidGvk {
        /// The rejected value.
        value: String,
    },
}

/// Converter registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A name pattern is not a valid regular expression.
    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Error from the regex compiler.
        #[source]
        source: regex::Error,
    },

    /// A CRD or schema document is malformed.
    #[error("invalid schema document '{name}': {message}")]
    InvalidSchema {
        /// Name of the CRD or type identifier.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

/// Plan persistence errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan could not be serialized.
    #[error("failed to serialize plan: {message}")]
    Serialize {
        /// Description of the serialization error.
        message: String,
    },

    /// A stored plan could not be parsed.
    #[error("failed to parse plan: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },

    /// A stored plan uses an unknown format version.
    #[error("unsupported plan version '{version}'")]
    UnsupportedVersion {
        /// The version found in the document.
        version: String,
    },
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps this error with the stage it occurred in.
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the outermost stage this error was wrapped with, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<&Stage> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the innermost error below all stage wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Stage { source, .. } = current {
            current = source;
        }
        current
    }
}

impl ConverterError {
    /// Creates a converter error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl SourceError {
    /// Creates a parse error for the given location.
    #[must_use]
    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl PlanError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }
}

impl TargetError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::HasNext => "check next object",
            Self::Next => "get next object",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resource => "resource",
            Self::Composition => "composition",
            Self::Composite => "composite",
            Self::Claim => "claim",
            Self::Configuration => "configuration",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrateConfiguration { name } => {
                write!(f, "failed to migrate the configuration: {name}")
            }
            Self::MigrateComposition { name } => {
                write!(f, "failed to migrate the composition: {name}")
            }
            Self::MigrateResource => write!(f, "failed to migrate resource"),
            Self::EditComposites => write!(f, "failed to edit composite resources"),
            Self::EditClaims => write!(f, "failed to edit claims"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_stages() {
        let err = MigrationError::from(ContractViolation::MissingTypeIdentifier {
            parent: String::from("vpc"),
        })
        .at(Stage::MigrateResource)
        .at(Stage::MigrateComposition {
            name: String::from("network"),
        });

        assert_eq!(
            err.stage(),
            Some(&Stage::MigrateComposition {
                name: String::from("network")
            })
        );
        assert!(matches!(
            err.root(),
            MigrationError::Contract(ContractViolation::MissingTypeIdentifier { .. })
        ));
    }

    #[test]
    fn test_stage_message_names_object() {
        let err = MigrationError::internal("boom").at(Stage::MigrateConfiguration {
            name: String::from("platform"),
        });
        assert_eq!(
            err.to_string(),
            "failed to migrate the configuration: platform: Internal error: boom"
        );
    }
}
