//! Cross-reference rewriting for composites and claims.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::error::ConversionError;
use crate::resource::{ObjectReference, PAUSED_ANNOTATION, Unstructured};

/// Field path of a composite's or claim's composition reference.
const COMPOSITION_REF_NAME: &str = "spec.compositionRef.name";

/// Field path of a composite's composed resource references.
const RESOURCE_REFS: &str = "spec.resourceRefs";

/// Identity of a converted managed resource: kind, name and API version.
pub(super) type ResourceIdentity = (String, String, String);

/// Rewrites `spec.compositionRef.name` if it names a migrated composition.
///
/// Returns true if the reference was rewritten.
pub(super) fn rewrite_composition_ref(object: &mut Unstructured, compositions: &HashMap<String, String>) -> bool {
    let Some(migrated) = object
        .get_str(COMPOSITION_REF_NAME)
        .and_then(|name| compositions.get(name))
        .cloned()
    else {
        return false;
    };
    object.set(COMPOSITION_REF_NAME, Value::String(migrated))
}

/// Replaces references to converted managed resources with references to
/// their replacements.
///
/// Replacements that only carry a generated-name prefix cannot be referenced
/// and are left out. Returns true if any reference was replaced.
///
/// # Errors
///
/// Returns an error if `spec.resourceRefs` is present but not a list.
pub(super) fn rewrite_resource_refs(
    object: &mut Unstructured,
    resources: &HashMap<ResourceIdentity, Vec<ObjectReference>>,
) -> Result<bool, ConversionError> {
    let Some(refs) = object.get(RESOURCE_REFS) else {
        return Ok(false);
    };
    let refs = refs.as_array().ok_or_else(|| ConversionError::InvalidReference {
        name: object.name().to_string(),
        message: format!("{RESOURCE_REFS} is not a list"),
    })?;

    let mut changed = false;
    let mut rewritten = Vec::with_capacity(refs.len());
    for entry in refs {
        let replacements = ObjectReference::from_value(entry).and_then(|r| resources.get(&r.identity()));
        let Some(replacements) = replacements else {
            rewritten.push(entry.clone());
            continue;
        };
        changed = true;
        for replacement in replacements {
            if replacement.name.is_empty() {
                warn!(
                    "Composite {} cannot reference {replacement}: the replacement has no name",
                    object.name()
                );
                continue;
            }
            rewritten.push(replacement.to_value());
        }
    }

    if changed {
        object.set(RESOURCE_REFS, Value::Array(rewritten));
    }
    Ok(changed)
}

/// Returns an edited copy of a composite, or `None` if none of its
/// references changed.
///
/// The copy stays paused until its start step runs.
///
/// # Errors
///
/// Returns an error if the resource references cannot be rewritten.
pub(super) fn edit_composite(
    composite: &Unstructured,
    resources: &HashMap<ResourceIdentity, Vec<ObjectReference>>,
    compositions: &HashMap<String, String>,
) -> Result<Option<Unstructured>, ConversionError> {
    let mut edited = composite.clone().sanitized();
    let composition_changed = rewrite_composition_ref(&mut edited, compositions);
    let resources_changed = rewrite_resource_refs(&mut edited, resources)?;
    if !(composition_changed || resources_changed) {
        return Ok(None);
    }
    edited.set_annotation(PAUSED_ANNOTATION, "true");
    Ok(Some(edited))
}

/// Returns an edited copy of a claim, or `None` if its composition was not migrated.
#[must_use]
pub(super) fn edit_claim(claim: &Unstructured, compositions: &HashMap<String, String>) -> Option<Unstructured> {
    let mut edited = claim.clone().sanitized();
    rewrite_composition_ref(&mut edited, compositions).then_some(edited)
}
