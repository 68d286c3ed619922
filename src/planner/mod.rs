//! Planning module for migration steps.
//!
//! This module drives objects through the registered converters and
//! records the ordered steps that replace the old objects in a cluster.

mod composition;
mod digest;
mod generator;
mod names;
mod plan;
mod references;

pub use digest::ManifestHasher;
pub use generator::{GeneratorOptions, MIGRATED_SUFFIX, PlanGenerator};
pub use names::NameGenerator;
pub use plan::{PLAN_VERSION, Plan, Step, StepKey, StepKind};
