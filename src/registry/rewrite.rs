//! Declarative API rewrites.
//!
//! Moving a resource to a new provider family often only changes its API
//! group or version while the schema stays compatible. An [`ApiRewrite`]
//! expresses that move in configuration instead of code.

use serde::{Deserialize, Serialize};

use crate::error::ConverterError;
use crate::resource::{GroupVersionKind, Unstructured};

use super::converter::ResourceConverter;

/// Components to replace in a type identifier; unset components are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GvkOverride {
    /// Replacement group.
    #[serde(default)]
    pub group: Option<String>,
    /// Replacement version.
    #[serde(default)]
    pub version: Option<String>,
    /// Replacement kind.
    #[serde(default)]
    pub kind: Option<String>,
}

/// Re-stamps resources of one type identifier with another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRewrite {
    /// Exact type identifier to rewrite.
    pub from: GroupVersionKind,
    /// Components to replace.
    pub to: GvkOverride,
}

impl ApiRewrite {
    /// Returns the type identifier produced by this rewrite.
    #[must_use]
    pub fn target(&self) -> GroupVersionKind {
        GroupVersionKind::new(
            self.to.group.clone().unwrap_or_else(|| self.from.group.clone()),
            self.to.version.clone().unwrap_or_else(|| self.from.version.clone()),
            self.to.kind.clone().unwrap_or_else(|| self.from.kind.clone()),
        )
    }
}

impl ResourceConverter for ApiRewrite {
    fn convert(&self, resource: &Unstructured) -> Result<Vec<Unstructured>, ConverterError> {
        let mut rewritten = resource.clone();
        rewritten.set_gvk(&self.target());
        Ok(vec![rewritten])
    }
}
