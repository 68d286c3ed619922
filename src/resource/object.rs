//! Untyped resource documents and the envelope carried through the planner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use super::fieldpath;
use super::gvk::GroupVersionKind;

/// Group of Crossplane composition types.
pub const APIEXTENSIONS_GROUP: &str = "apiextensions.crossplane.io";

/// Group of Crossplane package metadata types.
pub const PKG_META_GROUP: &str = "meta.pkg.crossplane.io";

/// Annotation that pauses reconciliation of a Crossplane resource.
pub const PAUSED_ANNOTATION: &str = "crossplane.io/paused";

/// Type identifier of `Composition` objects handled by the planner.
#[must_use]
pub fn composition_gvk() -> GroupVersionKind {
    GroupVersionKind::new(APIEXTENSIONS_GROUP, "v1", "Composition")
}

/// Type identifier of `v1` package configurations.
#[must_use]
pub fn configuration_v1_gvk() -> GroupVersionKind {
    GroupVersionKind::new(PKG_META_GROUP, "v1", "Configuration")
}

/// Type identifier of `v1alpha1` package configurations.
#[must_use]
pub fn configuration_v1alpha1_gvk() -> GroupVersionKind {
    GroupVersionKind::new(PKG_META_GROUP, "v1alpha1", "Configuration")
}

/// A resource document of arbitrary shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured(Value);

impl Unstructured {
    /// Wraps a JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Creates an empty object with the given type identifier and name.
    #[must_use]
    pub fn with_gvk(gvk: &GroupVersionKind, name: &str) -> Self {
        let mut object = Self(Value::Object(Map::new()));
        object.set_gvk(gvk);
        if !name.is_empty() {
            object.set_name(name);
        }
        object
    }

    /// Returns the underlying document.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns the underlying document mutably.
    pub const fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Consumes the wrapper.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns the type identifier from `apiVersion` and `kind`.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version(
            self.get_str("apiVersion").unwrap_or_default(),
            self.get_str("kind").unwrap_or_default(),
        )
    }

    /// Stamps `apiVersion` and `kind`.
    pub fn set_gvk(&mut self, gvk: &GroupVersionKind) {
        self.set("apiVersion", Value::String(gvk.api_version()));
        self.set("kind", Value::String(gvk.kind.clone()));
    }

    /// Returns `metadata.name`, or an empty string.
    #[must_use]
    pub fn name(&self) -> &str {
        self.get_str("metadata.name").unwrap_or_default()
    }

    /// Sets `metadata.name`.
    pub fn set_name(&mut self, name: &str) {
        self.set("metadata.name", Value::String(name.to_string()));
    }

    /// Returns `metadata.generateName`, or an empty string.
    #[must_use]
    pub fn generate_name(&self) -> &str {
        self.get_str("metadata.generateName").unwrap_or_default()
    }

    /// Sets `metadata.generateName`.
    pub fn set_generate_name(&mut self, prefix: &str) {
        self.set("metadata.generateName", Value::String(prefix.to_string()));
    }

    /// Returns `metadata.namespace`, if set.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.get_str("metadata.namespace").filter(|ns| !ns.is_empty())
    }

    /// Sets a metadata annotation.
    pub fn set_annotation(&mut self, key: &str, value: &str) {
        let path = format!("metadata.annotations[{key}]");
        self.set(&path, Value::String(value.to_string()));
    }

    /// Returns the value at a field path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        fieldpath::get(&self.0, path)
    }

    /// Returns the string at a field path.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        fieldpath::get_str(&self.0, path)
    }

    /// Sets a value at a field path, creating intermediate objects.
    ///
    /// Returns `false` if the path could not be set.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        fieldpath::set(&mut self.0, path, value)
    }

    /// Removes runtime-managed fields that must not be carried into new manifests.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if let Some(metadata) = self.0.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in ["uid", "resourceVersion", "generation", "creationTimestamp", "managedFields"] {
                metadata.remove(field);
            }
        }
        if let Some(object) = self.0.as_object_mut() {
            object.remove("status");
        }
        self
    }

    /// Returns a reference to this object.
    #[must_use]
    pub fn reference(&self) -> ObjectReference {
        ObjectReference::to(self)
    }
}

impl From<Value> for Unstructured {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Role of an object in the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// A managed resource.
    ManagedResource,
    /// A composite resource.
    Composite,
    /// A claim.
    Claim,
    /// A composition.
    Composition,
    /// A package configuration.
    Configuration,
    /// Anything else.
    #[default]
    Other,
}

impl Category {
    /// Infers the role of a document from its type identifier and shape.
    #[must_use]
    pub fn infer(object: &Unstructured) -> Self {
        let gvk = object.gvk();
        if gvk == composition_gvk() {
            return Self::Composition;
        }
        if gvk == configuration_v1_gvk() || gvk == configuration_v1alpha1_gvk() {
            return Self::Configuration;
        }
        if object.get("spec.forProvider").is_some() {
            return Self::ManagedResource;
        }
        let composed = ["spec.compositionRef", "spec.compositionSelector", "spec.resourceRefs", "spec.resourceRef"]
            .iter()
            .any(|path| object.get(path).is_some());
        if composed {
            return if object.namespace().is_some() {
                Self::Claim
            } else {
                Self::Composite
            };
        }
        Self::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ManagedResource => "managed",
            Self::Composite => "composite",
            Self::Claim => "claim",
            Self::Composition => "composition",
            Self::Configuration => "configuration",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Classification metadata attached to an object by its source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// File the object was read from, if any.
    pub path: Option<PathBuf>,
    /// Role of the object.
    pub category: Category,
}

/// A resource document plus its classification.
///
/// Envelopes are never mutated after emission; conversions produce new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The resource document.
    pub object: Unstructured,
    /// Classification metadata.
    pub metadata: Metadata,
}

impl Envelope {
    /// Creates an envelope with the given category.
    #[must_use]
    pub fn new(object: Unstructured, category: Category) -> Self {
        Self {
            object,
            metadata: Metadata {
                path: None,
                category,
            },
        }
    }

    /// Creates an envelope whose category is inferred from the document.
    #[must_use]
    pub fn classify(object: Unstructured) -> Self {
        let category = Category::infer(&object);
        Self::new(object, category)
    }

    /// Creates an envelope for a different object that keeps this one's metadata.
    #[must_use]
    pub fn derive(&self, object: Unstructured) -> Self {
        Self {
            object,
            metadata: self.metadata.clone(),
        }
    }

    /// Returns the object's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Returns the object's type identifier.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        self.object.gvk()
    }
}

/// Reference to a Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referent.
    pub api_version: String,
    /// Kind of the referent.
    pub kind: String,
    /// Name of the referent; may be empty when only a prefix is known.
    #[serde(default)]
    pub name: String,
    /// Namespace of the referent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Generated-name prefix, for objects created without a name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
}

impl ObjectReference {
    /// Creates a reference to `object`.
    #[must_use]
    pub fn to(object: &Unstructured) -> Self {
        let generate_name = Some(object.generate_name())
            .filter(|prefix| !prefix.is_empty() && object.name().is_empty())
            .map(String::from);
        Self {
            api_version: object.get_str("apiVersion").unwrap_or_default().to_string(),
            kind: object.get_str("kind").unwrap_or_default().to_string(),
            name: object.name().to_string(),
            namespace: object.namespace().map(String::from),
            generate_name,
        }
    }

    /// Parses a reference entry such as an element of `spec.resourceRefs`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(String::from);
        Some(Self {
            api_version: field("apiVersion")?,
            kind: field("kind")?,
            name: field("name")?,
            namespace: field("namespace"),
            generate_name: None,
        })
    }

    /// Returns the reference as a `{apiVersion, kind, name}` document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(String::from("apiVersion"), Value::String(self.api_version.clone()));
        object.insert(String::from("kind"), Value::String(self.kind.clone()));
        object.insert(String::from("name"), Value::String(self.name.clone()));
        if let Some(namespace) = &self.namespace {
            object.insert(String::from("namespace"), Value::String(namespace.clone()));
        }
        Value::Object(object)
    }

    /// Returns the key used to look up converted managed resources.
    #[must_use]
    pub fn identity(&self) -> (String, String, String) {
        (self.kind.clone(), self.name.clone(), self.api_version.clone())
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() {
            self.generate_name.as_deref().map_or_else(String::new, |p| format!("{p}*"))
        } else {
            self.name.clone()
        };
        match &self.namespace {
            Some(ns) => write!(f, "{}/{ns}/{name}", self.kind),
            None => write!(f, "{}/{name}", self.kind),
        }
    }
}
