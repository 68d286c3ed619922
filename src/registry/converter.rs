//! Converter capability traits implemented by migration plugins.
//!
//! Each trait covers one role. Plain closures with the matching signature
//! implement the single-method traits, which keeps small conversions
//! inline at the registration site.

use std::collections::BTreeMap;

use crate::error::ConverterError;
use crate::resource::{ComposedTemplate, ConfigurationV1, ConfigurationV1Alpha1, Patch, Unstructured};

/// Converts a single resource into zero or more replacements.
///
/// Every returned resource must carry `apiVersion` and `kind`. Resources
/// returned without a name or generated-name prefix receive a prefix derived
/// from the original name, except inside compositions.
pub trait ResourceConverter {
    /// Converts `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be converted.
    fn convert(&self, resource: &Unstructured) -> Result<Vec<Unstructured>, ConverterError>;
}

impl<F> ResourceConverter for F
where
    F: Fn(&Unstructured) -> Result<Vec<Unstructured>, ConverterError>,
{
    fn convert(&self, resource: &Unstructured) -> Result<Vec<Unstructured>, ConverterError> {
        self(resource)
    }
}

/// Edits a composition's patch sets in place, keyed by patch-set name.
pub trait PatchSetConverter {
    /// Converts the patch sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch sets cannot be converted.
    fn convert(&self, patch_sets: &mut BTreeMap<String, Vec<Patch>>) -> Result<(), ConverterError>;
}

impl<F> PatchSetConverter for F
where
    F: Fn(&mut BTreeMap<String, Vec<Patch>>) -> Result<(), ConverterError>,
{
    fn convert(&self, patch_sets: &mut BTreeMap<String, Vec<Patch>>) -> Result<(), ConverterError> {
        self(patch_sets)
    }
}

/// Adjusts the templates produced from one original composed template.
pub trait ComposedTemplateConverter {
    /// Edits `converted` in place, given the template they replace.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates cannot be adjusted.
    fn convert(
        &self,
        original: &ComposedTemplate,
        converted: &mut [ComposedTemplate],
    ) -> Result<(), ConverterError>;
}

impl<F> ComposedTemplateConverter for F
where
    F: Fn(&ComposedTemplate, &mut [ComposedTemplate]) -> Result<(), ConverterError>,
{
    fn convert(
        &self,
        original: &ComposedTemplate,
        converted: &mut [ComposedTemplate],
    ) -> Result<(), ConverterError> {
        self(original, converted)
    }
}

/// Edits package configurations in place.
///
/// The planner calls the hook matching the configuration's declared API
/// version. Both hooks default to no-ops.
pub trait ConfigurationConverter {
    /// Converts a `v1` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be converted.
    fn convert_v1(&self, _configuration: &mut ConfigurationV1) -> Result<(), ConverterError> {
        Ok(())
    }

    /// Converts a `v1alpha1` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be converted.
    fn convert_v1alpha1(&self, _configuration: &mut ConfigurationV1Alpha1) -> Result<(), ConverterError> {
        Ok(())
    }
}
