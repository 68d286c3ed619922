//! Converter registration and lookup.
//!
//! Migration plugins populate a [`Registry`] with converters for the roles
//! they handle; the planner only reads from it.

mod converter;
mod registry;
mod rewrite;

pub use converter::{
    ComposedTemplateConverter, ConfigurationConverter, PatchSetConverter, ResourceConverter,
};
pub use registry::Registry;
pub use rewrite::{ApiRewrite, GvkOverride};
