//! Migration plan types.
//!
//! A [`Plan`] collects steps in two phases. Steps are first added to a
//! pending list, deduplicated by their [`StepKey`]. Committing the plan
//! moves the pending steps into the ordered step list, grouped by
//! [`StepKind`] so that every step only depends on steps listed before it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{PlanError, Result};
use crate::resource::{ObjectReference, PAUSED_ANNOTATION, Unstructured};

use super::digest::ManifestHasher;

/// Version of the persisted plan format.
pub const PLAN_VERSION: &str = "0.1.0";

/// Kinds of migration steps.
///
/// Variants are declared in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepKind {
    /// Pause reconciliation of an existing managed resource.
    PauseManagedResource,
    /// Pause reconciliation of a composite resource.
    PauseComposite,
    /// Create a converted managed resource, paused.
    NewManagedResource,
    /// Create a migrated composition.
    NewComposition,
    /// Point a composite at migrated compositions and resources.
    EditComposite,
    /// Point a claim at a migrated composition.
    EditClaim,
    /// Set the deletion policy of a replaced managed resource to `Orphan`.
    OrphanManagedResource,
    /// Delete a replaced managed resource.
    DeleteManagedResource,
    /// Resume reconciliation of a managed resource.
    StartManagedResource,
    /// Resume reconciliation of a composite resource.
    StartComposite,
    /// Update a package configuration.
    EditConfiguration,
}

impl StepKind {
    /// Every step kind, in commit order.
    pub const ALL: [Self; 11] = [
        Self::PauseManagedResource,
        Self::PauseComposite,
        Self::NewManagedResource,
        Self::NewComposition,
        Self::EditComposite,
        Self::EditClaim,
        Self::OrphanManagedResource,
        Self::DeleteManagedResource,
        Self::StartManagedResource,
        Self::StartComposite,
        Self::EditConfiguration,
    ];

    /// Returns the short name of the step kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PauseManagedResource => "pause-managed",
            Self::PauseComposite => "pause-composite",
            Self::NewManagedResource => "new-managed",
            Self::NewComposition => "new-composition",
            Self::EditComposite => "edit-composite",
            Self::EditClaim => "edit-claim",
            Self::OrphanManagedResource => "orphan-managed",
            Self::DeleteManagedResource => "delete-managed",
            Self::StartManagedResource => "start-managed",
            Self::StartComposite => "start-composite",
            Self::EditConfiguration => "edit-configuration",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single migration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// What the step does.
    pub kind: StepKind,
    /// Object the step acts on.
    pub object: ObjectReference,
    /// Merge patch to apply, for pause, start and orphan steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,
    /// Full manifest to apply, for new and edit steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Value>,
    /// New version tag, for configuration edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Manifest digest of an object known only by its generated-name prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Step {
    /// Creates a step that applies a merge patch to `object`.
    #[must_use]
    pub const fn patch(kind: StepKind, object: ObjectReference, patch: Value) -> Self {
        Self {
            kind,
            object,
            patch: Some(patch),
            manifest: None,
            version: None,
            digest: None,
        }
    }

    /// Creates a step that applies the full manifest of `object`.
    #[must_use]
    pub fn apply(kind: StepKind, object: &Unstructured) -> Self {
        Self {
            kind,
            object: object.reference(),
            patch: None,
            manifest: Some(object.as_value().clone()),
            version: None,
            digest: None,
        }
    }

    /// Creates a step that pauses `object`.
    #[must_use]
    pub fn pause(kind: StepKind, object: ObjectReference) -> Self {
        Self::patch(
            kind,
            object,
            json!({"metadata": {"annotations": {PAUSED_ANNOTATION: "true"}}}),
        )
    }

    /// Creates a step that resumes `object` by removing its pause annotation.
    #[must_use]
    pub fn start(kind: StepKind, object: ObjectReference) -> Self {
        Self::patch(
            kind,
            object,
            json!({"metadata": {"annotations": {PAUSED_ANNOTATION: null}}}),
        )
    }

    /// Creates a step that orphans the external resource of `object`.
    #[must_use]
    pub fn orphan(object: ObjectReference) -> Self {
        Self::patch(
            StepKind::OrphanManagedResource,
            object,
            json!({"spec": {"deletionPolicy": "Orphan"}}),
        )
    }

    /// Creates a step that deletes `object`.
    #[must_use]
    pub const fn delete(object: ObjectReference) -> Self {
        Self {
            kind: StepKind::DeleteManagedResource,
            object,
            patch: None,
            manifest: None,
            version: None,
            digest: None,
        }
    }

    /// Creates a configuration edit carrying the converted manifest and its version tag.
    #[must_use]
    pub fn edit_configuration(original: ObjectReference, converted: &Unstructured) -> Self {
        Self {
            kind: StepKind::EditConfiguration,
            object: original,
            patch: None,
            manifest: Some(converted.as_value().clone()),
            version: Some(converted.gvk().version),
            digest: None,
        }
    }

    /// Ties a step on an unnamed object to that object's manifest.
    ///
    /// Patch steps on objects without a name would otherwise share a key,
    /// since their patches are identical. Named objects are left unchanged.
    #[must_use]
    pub fn for_object(mut self, object: &Unstructured) -> Self {
        if object.name().is_empty() {
            self.digest = Some(ManifestHasher::new().hash_manifest(object.as_value()));
        }
        self
    }

    /// Returns the key that identifies this step's logical action.
    #[must_use]
    pub fn key(&self) -> StepKey {
        let digest = if self.object.name.is_empty() {
            self.digest.clone().or_else(|| {
                self.manifest
                    .as_ref()
                    .or(self.patch.as_ref())
                    .map(|v| ManifestHasher::new().hash_manifest(v))
            })
        } else {
            None
        };
        StepKey {
            kind: self.kind,
            api_version: self.object.api_version.clone(),
            object_kind: self.object.kind.clone(),
            namespace: self.object.namespace.clone(),
            name: self.object.name.clone(),
            generate_name: self.object.generate_name.clone(),
            digest,
        }
    }

    /// Returns a human-readable description of the step.
    #[must_use]
    pub fn description(&self) -> String {
        let object = &self.object;
        match self.kind {
            StepKind::PauseManagedResource => format!("Pause managed resource {object}"),
            StepKind::PauseComposite => format!("Pause composite {object}"),
            StepKind::NewManagedResource => format!("Create managed resource {object}"),
            StepKind::NewComposition => format!("Create composition {object}"),
            StepKind::EditComposite => format!("Edit composite {object}"),
            StepKind::EditClaim => format!("Edit claim {object}"),
            StepKind::OrphanManagedResource => format!("Orphan managed resource {object}"),
            StepKind::DeleteManagedResource => format!("Delete managed resource {object}"),
            StepKind::StartManagedResource => format!("Start managed resource {object}"),
            StepKind::StartComposite => format!("Start composite {object}"),
            StepKind::EditConfiguration => format!(
                "Edit configuration {object} to {}",
                self.version.as_deref().unwrap_or("?")
            ),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.object)
    }
}

/// Identity of a step's logical action.
///
/// Objects known only by a generated-name prefix are told apart by a
/// digest of their manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    /// Step kind.
    pub kind: StepKind,
    /// API version of the target object.
    pub api_version: String,
    /// Kind of the target object.
    pub object_kind: String,
    /// Namespace of the target object.
    pub namespace: Option<String>,
    /// Name of the target object.
    pub name: String,
    /// Generated-name prefix of the target object.
    pub generate_name: Option<String>,
    /// Manifest digest, for unnamed objects.
    pub digest: Option<String>,
}

/// A migration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Format version.
    pub version: String,
    /// Committed steps, in execution order.
    pub steps: Vec<Step>,
    #[serde(skip)]
    pending: Vec<Step>,
    #[serde(skip)]
    keys: HashSet<StepKey>,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: PLAN_VERSION.to_string(),
            steps: Vec::new(),
            pending: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Adds a step to the pending list.
    ///
    /// Returns `false` without adding anything if a step with the same key
    /// was already added.
    pub fn add_step(&mut self, step: Step) -> bool {
        if !self.keys.insert(step.key()) {
            debug!("Skipping duplicate step: {step}");
            return false;
        }
        self.pending.push(step);
        true
    }

    /// Moves pending steps into the committed list in commit order.
    ///
    /// Steps of the same kind keep the order they were added in.
    pub fn commit_steps(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!("Committing {} steps", self.pending.len());
        self.steps.append(&mut self.pending);
        self.steps.sort_by_key(|s| s.kind);
    }

    /// Returns the number of steps added but not yet committed.
    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if the plan has no committed steps.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the number of committed steps.
    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the number of committed steps of a kind.
    #[must_use]
    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }

    /// Returns the committed steps of a kind.
    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    /// Returns a digest of the committed steps.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        ManifestHasher::new().hash_steps(&self.steps)
    }

    /// Serializes the committed plan to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PlanError::serialize(e.to_string()).into())
    }

    /// Parses a plan from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or has an unsupported version.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut plan: Self = serde_yaml::from_str(content).map_err(|e| PlanError::Parse {
            message: e.to_string(),
        })?;
        if plan.version != PLAN_VERSION {
            return Err(PlanError::UnsupportedVersion {
                version: plan.version,
            }
            .into());
        }
        plan.keys = plan.steps.iter().map(Step::key).collect();
        Ok(plan)
    }

    /// Writes the committed plan to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        debug!("Plan saved to {}", path.display());
        Ok(())
    }

    /// Reads a plan from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "No migration steps required");
        }

        writeln!(f, "Migration Plan ({} steps):", self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {i}. {}", step.description())?;
        }
        Ok(())
    }
}
