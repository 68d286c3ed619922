//! Converter registry.
//!
//! Resource converters are keyed by exact type identifier. Patch-set and
//! configuration converters are matched by regular expression against the
//! object's name, and every match applies in registration order so
//! conversions can be layered. Composed-template converters are keyed by
//! the template's source type identifier and may be narrowed to
//! compositions whose name matches a pattern.

use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::error::RegistryError;
use crate::resource::{FieldSchema, GroupVersionKind, Unstructured};

use super::converter::{
    ComposedTemplateConverter, ConfigurationConverter, PatchSetConverter, ResourceConverter,
};
use super::rewrite::ApiRewrite;

/// CRD category marking managed resource kinds.
const CATEGORY_MANAGED: &str = "managed";

struct NamedConverter<C: ?Sized> {
    pattern: Regex,
    converter: Box<C>,
}

struct TemplateConverter {
    gvk: GroupVersionKind,
    pattern: Option<Regex>,
    converter: Box<dyn ComposedTemplateConverter>,
}

/// Holds the converters and schema knowledge used by the planner.
#[derive(Default)]
pub struct Registry {
    resource_converters: HashMap<GroupVersionKind, Box<dyn ResourceConverter>>,
    template_converters: Vec<TemplateConverter>,
    patch_set_converters: Vec<NamedConverter<dyn PatchSetConverter>>,
    configuration_converters: Vec<NamedConverter<dyn ConfigurationConverter>>,
    managed_kinds: HashSet<GroupVersionKind>,
    schemas: HashMap<GroupVersionKind, FieldSchema>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource converter for an exact type identifier.
    ///
    /// The type identifier is also recorded as a managed resource kind.
    /// A later registration for the same identifier replaces the earlier one.
    pub fn register_resource_converter<C>(&mut self, gvk: GroupVersionKind, converter: C)
    where
        C: ResourceConverter + 'static,
    {
        debug!("Registering resource converter for {gvk}");
        self.managed_kinds.insert(gvk.clone());
        self.resource_converters.insert(gvk, Box::new(converter));
    }

    /// Registers a declarative API rewrite as a resource converter.
    pub fn register_rewrite(&mut self, rewrite: ApiRewrite) {
        let gvk = rewrite.from.clone();
        self.register_resource_converter(gvk, rewrite);
    }

    /// Registers a composed-template converter for templates of `gvk` in every composition.
    pub fn register_template_converter<C>(&mut self, gvk: GroupVersionKind, converter: C)
    where
        C: ComposedTemplateConverter + 'static,
    {
        self.template_converters.push(TemplateConverter {
            gvk,
            pattern: None,
            converter: Box::new(converter),
        });
    }

    /// Registers a composed-template converter for templates of `gvk` in
    /// compositions whose name matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn register_template_converter_for<C>(
        &mut self,
        gvk: GroupVersionKind,
        pattern: &str,
        converter: C,
    ) -> Result<(), RegistryError>
    where
        C: ComposedTemplateConverter + 'static,
    {
        self.template_converters.push(TemplateConverter {
            gvk,
            pattern: Some(compile(pattern)?),
            converter: Box::new(converter),
        });
        Ok(())
    }

    /// Registers a patch-set converter for compositions whose name matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn register_patch_set_converter<C>(&mut self, pattern: &str, converter: C) -> Result<(), RegistryError>
    where
        C: PatchSetConverter + 'static,
    {
        self.patch_set_converters.push(NamedConverter {
            pattern: compile(pattern)?,
            converter: Box::new(converter),
        });
        Ok(())
    }

    /// Registers a configuration converter for configurations whose name matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn register_configuration_converter<C>(&mut self, pattern: &str, converter: C) -> Result<(), RegistryError>
    where
        C: ConfigurationConverter + 'static,
    {
        self.configuration_converters.push(NamedConverter {
            pattern: compile(pattern)?,
            converter: Box::new(converter),
        });
        Ok(())
    }

    /// Records type identifiers as managed resource kinds.
    pub fn register_managed_kinds(&mut self, gvks: impl IntoIterator<Item = GroupVersionKind>) {
        self.managed_kinds.extend(gvks);
    }

    /// Registers the structural schema of a type identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if `schema` is not a JSON object.
    pub fn register_schema(&mut self, gvk: GroupVersionKind, schema: Value) -> Result<(), RegistryError> {
        let schema = FieldSchema::new(schema).ok_or_else(|| RegistryError::InvalidSchema {
            name: gvk.to_string(),
            message: String::from("schema must be an object"),
        })?;
        self.schemas.insert(gvk, schema);
        Ok(())
    }

    /// Registers every served version of a `CustomResourceDefinition`.
    ///
    /// Versions with an `openAPIV3Schema` have their schema registered, and
    /// CRDs in the `managed` category mark their kinds as managed.
    ///
    /// # Errors
    ///
    /// Returns an error if the CRD lacks its group, kind or versions.
    pub fn register_crd(&mut self, crd: &Unstructured) -> Result<Vec<GroupVersionKind>, RegistryError> {
        let invalid = |message: &str| RegistryError::InvalidSchema {
            name: crd.name().to_string(),
            message: message.to_string(),
        };
        let group = crd.get_str("spec.group").ok_or_else(|| invalid("missing spec.group"))?;
        let kind = crd.get_str("spec.names.kind").ok_or_else(|| invalid("missing spec.names.kind"))?;
        let versions = crd
            .get("spec.versions")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("missing spec.versions"))?;
        let managed = crd
            .get("spec.names.categories")
            .and_then(Value::as_array)
            .is_some_and(|c| c.iter().any(|v| v.as_str() == Some(CATEGORY_MANAGED)));

        let mut registered = Vec::with_capacity(versions.len());
        for version in versions {
            let name = version
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("version without a name"))?;
            let gvk = GroupVersionKind::new(group, name, kind);
            if let Some(schema) = version.get("schema").and_then(|s| s.get("openAPIV3Schema")) {
                self.register_schema(gvk.clone(), schema.clone())?;
            }
            if managed {
                self.managed_kinds.insert(gvk.clone());
            }
            registered.push(gvk);
        }
        debug!("Registered CRD {} ({} versions)", crd.name(), registered.len());
        Ok(registered)
    }

    /// Returns the resource converter for an exact type identifier.
    #[must_use]
    pub fn resource_converter(&self, gvk: &GroupVersionKind) -> Option<&dyn ResourceConverter> {
        self.resource_converters.get(gvk).map(AsRef::as_ref)
    }

    /// Returns the patch-set converters matching a composition name, in registration order.
    pub fn patch_set_converters<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a dyn PatchSetConverter> {
        self.patch_set_converters
            .iter()
            .filter(move |c| c.pattern.is_match(name))
            .map(|c| c.converter.as_ref())
    }

    /// Returns the configuration converters matching a configuration name, in registration order.
    pub fn configuration_converters<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a dyn ConfigurationConverter> {
        self.configuration_converters
            .iter()
            .filter(move |c| c.pattern.is_match(name))
            .map(|c| c.converter.as_ref())
    }

    /// Returns the composed-template converters for templates of `gvk` in
    /// the named composition, in registration order.
    pub fn template_converters<'a>(
        &'a self,
        gvk: &'a GroupVersionKind,
        composition: &'a str,
    ) -> impl Iterator<Item = &'a dyn ComposedTemplateConverter> {
        self.template_converters
            .iter()
            .filter(move |c| &c.gvk == gvk && c.pattern.as_ref().is_none_or(|p| p.is_match(composition)))
            .map(|c| c.converter.as_ref())
    }

    /// Returns true if `gvk` is known to be a managed resource kind.
    #[must_use]
    pub fn is_managed_kind(&self, gvk: &GroupVersionKind) -> bool {
        self.managed_kinds.contains(gvk)
    }

    /// Returns the registered schema of a type identifier.
    #[must_use]
    pub fn schema(&self, gvk: &GroupVersionKind) -> Option<&FieldSchema> {
        self.schemas.get(gvk)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("resource_converters", &self.resource_converters.len())
            .field("template_converters", &self.template_converters.len())
            .field("patch_set_converters", &self.patch_set_converters.len())
            .field("configuration_converters", &self.configuration_converters.len())
            .field("managed_kinds", &self.managed_kinds.len())
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, RegistryError> {
    Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConverterError;
    use crate::resource::{ComposedTemplate, Patch};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn vpc() -> GroupVersionKind {
        GroupVersionKind::new("ec2.aws.crossplane.io", "v1beta1", "VPC")
    }

    #[test]
    fn test_resource_lookup_is_exact() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), |r: &Unstructured| -> Result<Vec<Unstructured>, ConverterError> {
            Ok(vec![r.clone()])
        });

        assert!(registry.resource_converter(&vpc()).is_some());
        assert!(registry.is_managed_kind(&vpc()));
        assert!(registry
            .resource_converter(&GroupVersionKind::new("", "v1beta1", "VPC"))
            .is_none());
    }

    #[test]
    fn test_all_matching_patch_set_converters_apply_in_order() {
        let mut registry = Registry::new();
        registry
            .register_patch_set_converter("^network-.*", |_: &mut BTreeMap<String, Vec<Patch>>| -> Result<(), ConverterError> {
                Err(ConverterError::new("first"))
            })
            .unwrap();
        registry
            .register_patch_set_converter("^storage$", |_: &mut BTreeMap<String, Vec<Patch>>| -> Result<(), ConverterError> {
                Ok(())
            })
            .unwrap();
        registry
            .register_patch_set_converter(".*", |_: &mut BTreeMap<String, Vec<Patch>>| -> Result<(), ConverterError> {
                Err(ConverterError::new("last"))
            })
            .unwrap();

        let mut sets = BTreeMap::new();
        let results: Vec<_> = registry
            .patch_set_converters("network-aws")
            .map(|c| c.convert(&mut sets))
            .collect();
        assert_eq!(
            results,
            vec![Err(ConverterError::new("first")), Err(ConverterError::new("last"))]
        );
        assert_eq!(registry.patch_set_converters("storage").count(), 2);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut registry = Registry::new();
        struct Noop;
        impl ConfigurationConverter for Noop {}
        let err = registry.register_configuration_converter("(", Noop).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_template_converters_filter_by_composition_name() {
        let mut registry = Registry::new();
        let noop = |_: &ComposedTemplate, _: &mut [ComposedTemplate]| -> Result<(), ConverterError> { Ok(()) };
        registry.register_template_converter(vpc(), noop);
        registry
            .register_template_converter_for(vpc(), "^prod-", noop)
            .unwrap();

        assert_eq!(registry.template_converters(&vpc(), "prod-network").count(), 2);
        assert_eq!(registry.template_converters(&vpc(), "dev-network").count(), 1);
        let subnet = GroupVersionKind::new("ec2.aws.crossplane.io", "v1beta1", "Subnet");
        assert_eq!(registry.template_converters(&subnet, "prod-network").count(), 0);
    }

    #[test]
    fn test_register_crd() {
        let crd = Unstructured::new(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": "vpcs.ec2.aws.upbound.io"},
            "spec": {
                "group": "ec2.aws.upbound.io",
                "names": {"kind": "VPC", "categories": ["crossplane", "managed", "aws"]},
                "versions": [
                    {"name": "v1beta1", "schema": {"openAPIV3Schema": {"type": "object", "properties": {}}}},
                    {"name": "v1beta2"}
                ]
            }
        }));

        let mut registry = Registry::new();
        let registered = registry.register_crd(&crd).unwrap();
        let v1beta1 = GroupVersionKind::new("ec2.aws.upbound.io", "v1beta1", "VPC");
        assert_eq!(registered.len(), 2);
        assert!(registry.is_managed_kind(&v1beta1));
        assert!(registry.schema(&v1beta1).is_some());
        assert!(registry
            .schema(&GroupVersionKind::new("ec2.aws.upbound.io", "v1beta2", "VPC"))
            .is_none());
    }

    #[test]
    fn test_register_crd_requires_group() {
        let mut registry = Registry::new();
        let crd = Unstructured::new(json!({"kind": "CustomResourceDefinition", "metadata": {"name": "x"}, "spec": {}}));
        assert!(registry.register_crd(&crd).is_err());
    }
}
