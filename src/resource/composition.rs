//! Typed view of Crossplane compositions and package configurations.
//!
//! Only the fields the planner reads or rewrites are modelled; everything
//! else is kept in flattened maps so a decode/encode cycle is lossless.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ConversionError;

use super::object::Unstructured;

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace, for namespaced objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Remaining metadata fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Crossplane `Composition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    /// API version.
    pub api_version: String,
    /// Kind.
    pub kind: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Specification.
    #[serde(default)]
    pub spec: CompositionSpec,
}

/// Specification of a composition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSpec {
    /// Named, reusable patch groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patch_sets: Vec<PatchSet>,
    /// Composed templates.
    #[serde(default)]
    pub resources: Vec<ComposedTemplate>,
    /// Remaining spec fields (compositeTypeRef, writeConnectionSecretsToNamespace, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named group of patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    /// Name referenced by `PatchSet` patches.
    pub name: String,
    /// Patches in the set.
    #[serde(default)]
    pub patches: Vec<Patch>,
}

/// One entry of a composition's resource list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedTemplate {
    /// Template name, unique within the composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base resource document.
    pub base: Value,
    /// Patches applied to the base.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
    /// Remaining template fields (connectionDetails, readinessChecks, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field patch rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Patch type; `FromCompositeFieldPath` when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
    /// Source field path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_field_path: Option<String>,
    /// Destination field path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_field_path: Option<String>,
    /// Referenced patch set, for `PatchSet` patches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_name: Option<String>,
    /// Remaining fields (transforms, combine, policy, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patch {
    /// Patch type referencing a named patch set.
    pub const TYPE_PATCH_SET: &'static str = "PatchSet";

    /// Returns the patch type, applying the default.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.patch_type.as_deref().unwrap_or("FromCompositeFieldPath")
    }

    /// Returns true for patches that reference a patch set.
    #[must_use]
    pub fn is_patch_set_ref(&self) -> bool {
        self.kind() == Self::TYPE_PATCH_SET
    }

    /// Returns the field path on the composed resource this patch touches.
    ///
    /// `To*` patches read from the composed resource; every other patch
    /// type writes to it.
    #[must_use]
    pub fn composed_field_path(&self) -> Option<&str> {
        match self.kind() {
            Self::TYPE_PATCH_SET => None,
            "ToCompositeFieldPath" | "CombineToComposite" => self.from_field_path.as_deref(),
            _ => self.to_field_path.as_deref(),
        }
    }
}

/// Version constraint on Crossplane itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossplaneConstraints {
    /// Semantic version range.
    pub version: String,
}

/// A package dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Provider package reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Configuration package reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// Semantic version range.
    #[serde(default)]
    pub version: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Package metadata specification shared by both configuration versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaSpec {
    /// Crossplane version constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossplane: Option<CrossplaneConstraints>,
    /// Package dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<Dependency>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A `meta.pkg.crossplane.io/v1` `Configuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationV1 {
    /// API version.
    pub api_version: String,
    /// Kind.
    pub kind: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Specification.
    #[serde(default)]
    pub spec: MetaSpec,
}

/// A `meta.pkg.crossplane.io/v1alpha1` `Configuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationV1Alpha1 {
    /// API version.
    pub api_version: String,
    /// Kind.
    pub kind: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Specification.
    #[serde(default)]
    pub spec: MetaSpec,
}

/// A configuration decoded according to its declared version.
#[derive(Debug, Clone, PartialEq)]
pub enum Configuration {
    /// Decoded as `v1`.
    V1(ConfigurationV1),
    /// Decoded as `v1alpha1`.
    V1Alpha1(ConfigurationV1Alpha1),
}

impl Configuration {
    /// Decodes `object` as the version named in its `apiVersion`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the typed form.
    pub fn decode(object: &Unstructured) -> Result<Self, ConversionError> {
        if object.gvk().version == "v1alpha1" {
            decode(object, "configuration").map(Self::V1Alpha1)
        } else {
            decode(object, "configuration").map(Self::V1)
        }
    }

    /// Encodes the configuration back into a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Unstructured, ConversionError> {
        match self {
            Self::V1(c) => encode(c, &c.metadata.name, "configuration"),
            Self::V1Alpha1(c) => encode(c, &c.metadata.name, "configuration"),
        }
    }
}

impl Composition {
    /// Decodes a composition document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the typed form.
    pub fn decode(object: &Unstructured) -> Result<Self, ConversionError> {
        decode(object, "composition")
    }

    /// Encodes the composition back into a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Unstructured, ConversionError> {
        encode(self, &self.metadata.name, "composition")
    }

    /// Returns the patch sets keyed by name.
    #[must_use]
    pub fn patch_set_map(&self) -> BTreeMap<String, Vec<Patch>> {
        self.spec
            .patch_sets
            .iter()
            .map(|ps| (ps.name.clone(), ps.patches.clone()))
            .collect()
    }
}

/// Decodes a document into a typed form.
///
/// # Errors
///
/// Returns a decode error naming the object.
pub fn decode<T: DeserializeOwned>(object: &Unstructured, what: &'static str) -> Result<T, ConversionError> {
    serde_json::from_value(object.as_value().clone()).map_err(|e| ConversionError::Decode {
        what,
        name: object.name().to_string(),
        message: e.to_string(),
    })
}

fn encode<T: Serialize>(typed: &T, name: &str, what: &'static str) -> Result<Unstructured, ConversionError> {
    serde_json::to_value(typed)
        .map(Unstructured::new)
        .map_err(|e| ConversionError::Decode {
            what,
            name: name.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn composition_doc() -> Unstructured {
        Unstructured::new(json!({
            "apiVersion": "apiextensions.crossplane.io/v1",
            "kind": "Composition",
            "metadata": {"name": "network", "labels": {"provider": "aws"}},
            "spec": {
                "compositeTypeRef": {"apiVersion": "example.org/v1", "kind": "XNetwork"},
                "patchSets": [{"name": "common", "patches": [{"fromFieldPath": "spec.region", "toFieldPath": "spec.forProvider.region"}]}],
                "resources": [{
                    "name": "vpc",
                    "base": {"apiVersion": "ec2.aws.crossplane.io/v1beta1", "kind": "VPC"},
                    "patches": [
                        {"type": "PatchSet", "patchSetName": "common"},
                        {"type": "ToCompositeFieldPath", "fromFieldPath": "status.atProvider.vpcId", "toFieldPath": "status.vpcId"}
                    ],
                    "readinessChecks": [{"type": "None"}]
                }]
            }
        }))
    }

    #[test]
    fn test_composition_decode_encode_is_lossless() {
        let doc = composition_doc();
        let composition = Composition::decode(&doc).unwrap();
        assert_eq!(composition.metadata.name, "network");
        assert_eq!(composition.spec.patch_sets.len(), 1);
        assert_eq!(composition.spec.resources[0].name.as_deref(), Some("vpc"));
        assert!(composition.spec.extra.contains_key("compositeTypeRef"));

        assert_eq!(composition.encode().unwrap(), doc);
    }

    #[test]
    fn test_composed_field_path_by_patch_type() {
        let composition = Composition::decode(&composition_doc()).unwrap();
        let patches = &composition.spec.resources[0].patches;
        assert!(patches[0].is_patch_set_ref());
        assert_eq!(patches[0].composed_field_path(), None);
        assert_eq!(patches[1].composed_field_path(), Some("status.atProvider.vpcId"));
        assert_eq!(
            composition.spec.patch_sets[0].patches[0].composed_field_path(),
            Some("spec.forProvider.region")
        );
    }

    #[test]
    fn test_configuration_decodes_by_declared_version() {
        let alpha = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1alpha1",
            "kind": "Configuration",
            "metadata": {"name": "platform"},
            "spec": {"dependsOn": [{"provider": "xpkg.upbound.io/crossplane-contrib/provider-aws", "version": ">=v0.33.0"}]}
        }));
        assert!(matches!(Configuration::decode(&alpha).unwrap(), Configuration::V1Alpha1(_)));

        let v1 = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1",
            "kind": "Configuration",
            "metadata": {"name": "platform"}
        }));
        let Configuration::V1(decoded) = Configuration::decode(&v1).unwrap() else {
            panic!("expected v1 configuration");
        };
        assert!(decoded.spec.depends_on.is_empty());
    }
}
