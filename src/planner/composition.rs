//! Composition conversion.
//!
//! Patch sets are converted first so that template defaulting knows which
//! patch-set references were rewritten. Each composed template's base is
//! then run through the resource converters, and every resulting template
//! gets its invalid patches removed and, when needed, a fresh name.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::error::{ConversionError, Result};
use crate::registry::Registry;
use crate::resource::{
    ComposedTemplate, Composition, Envelope, FieldSchema, GroupVersionKind, Patch, PatchSet,
    Unstructured, any_matches,
};

use super::generator::{GeneratorOptions, convert_resource};
use super::names::NameGenerator;

/// Per-composition state shared by its templates.
struct Scope {
    name: String,
    patch_sets: BTreeMap<String, Vec<Patch>>,
    converted_sets: HashSet<String>,
    taken: HashSet<String>,
}

/// Converts compositions with the registered converters.
pub(super) struct CompositionMigrator<'a> {
    pub(super) registry: &'a Registry,
    pub(super) options: &'a GeneratorOptions,
    pub(super) names: &'a mut NameGenerator,
}

impl CompositionMigrator<'_> {
    /// Converts the composition in `envelope`.
    ///
    /// Returns the converted composition and whether any patch set or
    /// composed template base was converted.
    pub(super) fn migrate(&mut self, envelope: &Envelope) -> Result<(Composition, bool)> {
        let mut composition = Composition::decode(&envelope.object)?;
        let converted_sets = self.convert_patch_sets(&mut composition)?;
        let mut converted = !converted_sets.is_empty();

        let templates = std::mem::take(&mut composition.spec.resources);
        let mut scope = Scope {
            name: composition.metadata.name.clone(),
            patch_sets: composition.patch_set_map(),
            converted_sets,
            taken: templates.iter().filter_map(|t| t.name.clone()).collect(),
        };

        let mut resources = Vec::with_capacity(templates.len());
        for template in &templates {
            let (replacements, template_converted) = self.convert_template(&mut scope, envelope, template)?;
            converted |= template_converted;
            resources.extend(replacements);
        }
        composition.spec.resources = resources;

        debug!(
            "Composition {} has {} composed templates after conversion",
            scope.name,
            composition.spec.resources.len()
        );
        Ok((composition, converted))
    }

    /// Runs every matching patch-set converter and returns the names of the
    /// patch sets that changed or were removed.
    fn convert_patch_sets(&self, composition: &mut Composition) -> Result<HashSet<String>> {
        let name = composition.metadata.name.clone();
        let mut converters = self.registry.patch_set_converters(&name).peekable();
        if converters.peek().is_none() {
            return Ok(HashSet::new());
        }

        let original = composition.patch_set_map();
        let mut sets = original.clone();
        for converter in converters {
            converter
                .convert(&mut sets)
                .map_err(|source| ConversionError::PatchSets {
                    composition: name.clone(),
                    source,
                })?;
        }

        let mut changed: HashSet<String> = sets
            .iter()
            .filter(|(set, patches)| original.get(*set) != Some(*patches))
            .map(|(set, _)| set.clone())
            .collect();
        changed.extend(original.keys().filter(|set| !sets.contains_key(*set)).cloned());

        // Keep the declared order, then append sets the converters added.
        let mut rebuilt = Vec::with_capacity(sets.len());
        for existing in &composition.spec.patch_sets {
            if let Some(patches) = sets.remove(&existing.name) {
                rebuilt.push(PatchSet {
                    name: existing.name.clone(),
                    patches,
                });
            }
        }
        rebuilt.extend(sets.into_iter().map(|(name, patches)| PatchSet { name, patches }));
        composition.spec.patch_sets = rebuilt;

        Ok(changed)
    }

    fn convert_template(
        &mut self,
        scope: &mut Scope,
        envelope: &Envelope,
        template: &ComposedTemplate,
    ) -> Result<(Vec<ComposedTemplate>, bool)> {
        let base = Unstructured::new(template.base.clone());
        let source_gvk = base.gvk();
        let (objects, converted) = convert_resource(self.registry, &envelope.derive(base), true)?;

        let mut source_name_used = false;
        let mut replacements = Vec::with_capacity(objects.len());
        for object in objects {
            let target = object.gvk();
            let mut replacement = ComposedTemplate {
                base: object.object.into_value(),
                ..template.clone()
            };
            self.set_defaults(scope, template, &source_gvk, &target, &mut replacement, &mut source_name_used)?;
            replacements.push(replacement);
        }

        for converter in self.registry.template_converters(&source_gvk, &scope.name) {
            converter
                .convert(template, &mut replacements)
                .map_err(|source| ConversionError::ComposedTemplate {
                    composition: scope.name.clone(),
                    source,
                })?;
        }
        Ok((replacements, converted))
    }

    /// Removes invalid patches and renames templates that would collide.
    ///
    /// The first replacement of the source kind keeps the original name.
    fn set_defaults(
        &mut self,
        scope: &mut Scope,
        template: &ComposedTemplate,
        source: &GroupVersionKind,
        target: &GroupVersionKind,
        replacement: &mut ComposedTemplate,
        source_name_used: &mut bool,
    ) -> Result<()> {
        if any_matches(&self.options.skip_gvks, source) {
            return Ok(());
        }
        self.remove_invalid_patches(scope, template, source, target, replacement)?;

        if *source_name_used || source.kind != target.kind {
            if let Some(name) = template.name.as_deref().filter(|n| !n.is_empty()) {
                replacement.name = Some(self.names.unique(name, &mut scope.taken));
            }
        } else {
            *source_name_used = true;
        }
        Ok(())
    }

    fn remove_invalid_patches(
        &self,
        scope: &Scope,
        template: &ComposedTemplate,
        source: &GroupVersionKind,
        target: &GroupVersionKind,
        replacement: &mut ComposedTemplate,
    ) -> Result<()> {
        let Some(target_schema) = self.registry.schema(target) else {
            return Ok(());
        };
        let source_schema = self.registry.schema(source);

        let mut kept = Vec::with_capacity(replacement.patches.len());
        for patch in std::mem::take(&mut replacement.patches) {
            let Some(field_path) = invalid_path(scope, source_schema, target_schema, &patch) else {
                kept.push(patch);
                continue;
            };
            let template_name = template.name.clone().unwrap_or_default();
            if self.options.error_on_invalid_patch_schema {
                return Err(ConversionError::InvalidPatch {
                    composition: scope.name.clone(),
                    template: template_name,
                    field_path,
                    target: target.to_string(),
                }
                .into());
            }
            warn!(
                "Dropping patch on '{field_path}' of template '{template_name}' in composition '{}': not valid for {target}",
                scope.name
            );
        }
        replacement.patches = kept;
        Ok(())
    }
}

/// Returns the offending field path if `patch` does not conform to the target schema.
///
/// Patch-set references are checked through the referenced set, unless
/// that set was converted.
fn invalid_path(
    scope: &Scope,
    source: Option<&FieldSchema>,
    target: &FieldSchema,
    patch: &Patch,
) -> Option<String> {
    if patch.is_patch_set_ref() {
        let set = patch.patch_set_name.as_deref()?;
        if scope.converted_sets.contains(set) {
            return None;
        }
        return scope
            .patch_sets
            .get(set)?
            .iter()
            .find_map(|p| invalid_field_path(source, target, p));
    }
    invalid_field_path(source, target, patch)
}

fn invalid_field_path(source: Option<&FieldSchema>, target: &FieldSchema, patch: &Patch) -> Option<String> {
    let path = patch.composed_field_path()?;
    let known_at_source = source.is_none_or(|s| s.accepts(path));
    (known_at_source && !target.accepts(path)).then(|| path.to_string())
}
