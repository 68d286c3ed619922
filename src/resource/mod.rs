//! Resource documents and type identifiers.
//!
//! This module holds the data the planner moves around:
//! - Untyped documents and the envelope that tags them with a role
//! - Group/version/kind identifiers with wildcard matching
//! - Typed compositions and package configurations
//! - Field path access and schema lookups for patch validation

pub mod fieldpath;
mod composition;
mod gvk;
mod object;
mod schema;

pub use composition::{
    ComposedTemplate, Composition, CompositionSpec, Configuration, ConfigurationV1,
    ConfigurationV1Alpha1, CrossplaneConstraints, Dependency, MetaSpec, ObjectMeta, Patch,
    PatchSet, decode,
};
pub use gvk::{GroupVersionKind, any_matches};
pub use object::{
    APIEXTENSIONS_GROUP, Category, Envelope, Metadata, ObjectReference, PAUSED_ANNOTATION,
    PKG_META_GROUP, Unstructured, composition_gvk, configuration_v1_gvk,
    configuration_v1alpha1_gvk,
};
pub use schema::FieldSchema;
