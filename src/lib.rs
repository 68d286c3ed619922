// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # xp-migration
//!
//! Generates migration plans that move Crossplane installations from one set
//! of provider APIs to another.
//!
//! ## Overview
//!
//! The planner reads the manifests of a live installation and produces:
//!
//! - Converted managed resources, compositions and package configurations
//! - Edited composites and claims that point at the converted objects
//! - An ordered, versioned plan of steps to apply them safely
//!
//! ## Architecture
//!
//! Every object flows through one generation pass:
//!
//! 1. **Source**: yields manifests tagged with their role
//! 2. **Registry**: holds the converters that apply to each role
//! 3. **Generator**: converts objects, writes them to a target and records steps
//! 4. **Plan**: orders the steps so resources are paused before they are
//!    replaced and started only after everything that references them moved
//!
//! ## Modules
//!
//! - [`resource`]: Documents, type identifiers and typed compositions
//! - [`registry`]: Converter traits and the converter registry
//! - [`planner`]: Plan generation and the plan format
//! - [`io`]: Manifest sources and targets
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! errorOnInvalidPatchSchema: false
//! skipGvks:
//!   - group: ec2.aws.crossplane.io
//!     version: v1beta1
//!     kind: SecurityGroup
//! rewrites:
//!   - from:
//!       group: ec2.aws.crossplane.io
//!       version: v1beta1
//!       kind: VPC
//!     to:
//!       group: ec2.aws.upbound.io
//! crds:
//!   - crds/ec2.aws.upbound.io_vpcs.yaml
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod planner;
pub mod registry;
pub mod resource;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, MigrationConfig};
pub use error::{MigrationError, Result};
pub use io::{FileSystemSource, FileSystemTarget, MemorySource, MemoryTarget, Source, Target};
pub use planner::{GeneratorOptions, Plan, PlanGenerator, Step, StepKind};
pub use registry::{
    ApiRewrite, ComposedTemplateConverter, ConfigurationConverter, PatchSetConverter, Registry,
    ResourceConverter,
};
pub use resource::{Envelope, GroupVersionKind, Unstructured};
