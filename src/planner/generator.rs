//! Migration plan generation.
//!
//! The generator drains a [`Source`], routes every object through the
//! converters that apply to its role, writes converted objects to a
//! [`Target`] and records the steps that move a live cluster from the old
//! objects to the new ones. Composites and claims are held back until the
//! stream ends, since rewriting their references needs everything the main
//! pass learned about converted resources and compositions.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

use crate::error::{
    ContractViolation, ConversionError, MigrationError, OutputKind, Result, SourceOperation, Stage,
};
use crate::io::{Source, Target};
use crate::registry::Registry;
use crate::resource::{
    Category, Configuration, Envelope, GroupVersionKind, ObjectReference, PAUSED_ANNOTATION,
    composition_gvk, configuration_v1_gvk, configuration_v1alpha1_gvk,
};

use super::composition::CompositionMigrator;
use super::names::NameGenerator;
use super::plan::{Plan, Step, StepKind};
use super::references::{self, ResourceIdentity};

/// Suffix appended to the names of migrated compositions.
pub const MIGRATED_SUFFIX: &str = "-migrated";

/// Generation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Fail generation when a composed-template patch does not conform to
    /// the target schema, instead of dropping the patch.
    pub error_on_invalid_patch_schema: bool,
    /// Source type identifiers whose composed templates are left without
    /// defaulting. Empty components match any value.
    pub skip_gvks: Vec<GroupVersionKind>,
}

impl GeneratorOptions {
    /// Sets whether invalid patches fail generation.
    #[must_use]
    pub const fn with_error_on_invalid_patch_schema(mut self, enabled: bool) -> Self {
        self.error_on_invalid_patch_schema = enabled;
        self
    }

    /// Sets the skip list.
    #[must_use]
    pub fn with_skip_gvks(mut self, skip_gvks: Vec<GroupVersionKind>) -> Self {
        self.skip_gvks = skip_gvks;
        self
    }
}

/// Generates a migration plan from a source of manifests.
#[derive(Debug)]
pub struct PlanGenerator<'r, S, T> {
    registry: &'r Registry,
    source: S,
    target: T,
    options: GeneratorOptions,
    names: NameGenerator,
    plan: Plan,
}

impl<'r, S: Source, T: Target> PlanGenerator<'r, S, T> {
    /// Creates a generator whose name suffixes come from system entropy.
    #[must_use]
    pub fn new(registry: &'r Registry, source: S, target: T, options: GeneratorOptions) -> Self {
        Self {
            registry,
            source,
            target,
            options,
            names: NameGenerator::from_entropy(),
            plan: Plan::new(),
        }
    }

    /// Replaces the name generator, for deterministic suffixes.
    #[must_use]
    pub fn with_name_generator(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    /// Returns the plan built so far.
    #[must_use]
    pub const fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Returns the target.
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Consumes the generator and returns its plan.
    #[must_use]
    pub fn into_plan(self) -> Plan {
        self.plan
    }

    /// Reads every object from the source and records the migration steps.
    ///
    /// Each call starts from an empty plan. Steps added before a failure are
    /// still committed; a plan produced by a failed call is incomplete and
    /// must not be executed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails, a converter fails or breaks its
    /// contract, a reference cannot be rewritten, or the target rejects an
    /// object.
    pub fn generate_plan(&mut self) -> Result<()> {
        info!("Generating migration plan");
        self.plan = Plan::new();
        let pass = Pass {
            registry: self.registry,
            options: &self.options,
            names: &mut self.names,
            source: &mut self.source,
            target: &mut self.target,
            plan: CommitOnDrop(&mut self.plan),
            converted_resources: HashMap::new(),
            converted_compositions: HashMap::new(),
            composites: Vec::new(),
            claims: Vec::new(),
        };
        let result = pass.run();
        info!("Migration plan has {} steps", self.plan.step_count());
        result
    }
}

/// Commits the plan's pending steps when dropped.
struct CommitOnDrop<'a>(&'a mut Plan);

impl Drop for CommitOnDrop<'_> {
    fn drop(&mut self) {
        self.0.commit_steps();
    }
}

impl Deref for CommitOnDrop<'_> {
    type Target = Plan;

    fn deref(&self) -> &Plan {
        self.0
    }
}

impl DerefMut for CommitOnDrop<'_> {
    fn deref_mut(&mut self) -> &mut Plan {
        self.0
    }
}

/// State of one generation run.
struct Pass<'a, S, T> {
    registry: &'a Registry,
    options: &'a GeneratorOptions,
    names: &'a mut NameGenerator,
    source: &'a mut S,
    target: &'a mut T,
    plan: CommitOnDrop<'a>,
    converted_resources: HashMap<ResourceIdentity, Vec<ObjectReference>>,
    converted_compositions: HashMap<String, String>,
    composites: Vec<Envelope>,
    claims: Vec<Envelope>,
}

impl<S: Source, T: Target> Pass<'_, S, T> {
    fn run(mut self) -> Result<()> {
        loop {
            let has_next = self.source.has_next().map_err(|source| MigrationError::Source {
                operation: SourceOperation::HasNext,
                source,
            })?;
            if !has_next {
                break;
            }
            let object = self.source.next().map_err(|source| MigrationError::Source {
                operation: SourceOperation::Next,
                source,
            })?;
            self.route(object)?;
        }

        self.edit_composites().map_err(|e| e.at(Stage::EditComposites))?;
        self.start_composites();
        self.edit_claims().map_err(|e| e.at(Stage::EditClaims))?;
        Ok(())
    }

    fn route(&mut self, envelope: Envelope) -> Result<()> {
        let gvk = envelope.gvk();
        debug!("Routing {gvk} '{}' ({})", envelope.name(), envelope.metadata.category);

        let mut converted = false;
        if gvk == configuration_v1_gvk() || gvk == configuration_v1alpha1_gvk() {
            self.migrate_configuration(&envelope).map_err(|e| {
                e.at(Stage::MigrateConfiguration {
                    name: envelope.name().to_string(),
                })
            })?;
        } else if gvk == composition_gvk() {
            self.migrate_composition(&envelope).map_err(|e| {
                e.at(Stage::MigrateComposition {
                    name: envelope.name().to_string(),
                })
            })?;
        } else {
            match envelope.metadata.category {
                Category::Composite => {
                    self.plan
                        .add_step(Step::pause(StepKind::PauseComposite, envelope.object.reference()));
                    self.composites.push(envelope);
                    return Ok(());
                }
                Category::Claim => {
                    self.claims.push(envelope);
                    return Ok(());
                }
                _ => {
                    converted = self
                        .migrate_resource(&envelope)
                        .map_err(|e| e.at(Stage::MigrateResource))?;
                }
            }
        }

        self.add_steps_for_managed_resource(&envelope, converted);
        Ok(())
    }

    fn is_managed(&self, envelope: &Envelope) -> bool {
        envelope.metadata.category == Category::ManagedResource || self.registry.is_managed_kind(&envelope.gvk())
    }

    /// Pauses every managed resource, and retires the ones that were replaced.
    fn add_steps_for_managed_resource(&mut self, envelope: &Envelope, converted: bool) {
        if !self.is_managed(envelope) {
            return;
        }
        let reference = envelope.object.reference();
        self.plan
            .add_step(Step::pause(StepKind::PauseManagedResource, reference.clone()));
        if converted {
            self.plan.add_step(Step::orphan(reference.clone()));
            self.plan.add_step(Step::delete(reference));
        }
    }

    fn migrate_configuration(&mut self, envelope: &Envelope) -> Result<()> {
        let registry = self.registry;
        let name = envelope.name();
        let mut converters = registry.configuration_converters(name).peekable();
        if converters.peek().is_none() {
            return Ok(());
        }

        let mut configuration = Configuration::decode(&envelope.object)?;
        for converter in converters {
            let result = match &mut configuration {
                Configuration::V1(c) => converter.convert_v1(c),
                Configuration::V1Alpha1(c) => converter.convert_v1alpha1(c),
            };
            result.map_err(|source| ConversionError::Configuration {
                name: name.to_string(),
                source,
            })?;
        }

        let converted = envelope.derive(configuration.encode()?.sanitized());
        self.plan.add_step(Step::edit_configuration(
            envelope.object.reference(),
            &converted.object,
        ));
        self.put(&converted, OutputKind::Configuration)?;
        info!("Converted configuration '{name}'");
        Ok(())
    }

    fn migrate_composition(&mut self, envelope: &Envelope) -> Result<()> {
        let (mut composition, converted) = CompositionMigrator {
            registry: self.registry,
            options: self.options,
            names: &mut *self.names,
        }
        .migrate(envelope)?;
        if !converted {
            debug!("Composition '{}' needs no conversion", envelope.name());
            return Ok(());
        }

        let migrated_name = format!("{}{MIGRATED_SUFFIX}", envelope.name());
        composition.metadata.name.clone_from(&migrated_name);
        let migrated = envelope.derive(composition.encode()?.sanitized());

        self.converted_compositions
            .insert(envelope.name().to_string(), migrated_name.clone());
        self.plan
            .add_step(Step::apply(StepKind::NewComposition, &migrated.object));
        self.put(&migrated, OutputKind::Composition)?;
        info!("Migrated composition '{}' to '{migrated_name}'", envelope.name());
        Ok(())
    }

    /// Converts a resource outside any composition.
    ///
    /// Returns true if a converter replaced it.
    fn migrate_resource(&mut self, envelope: &Envelope) -> Result<bool> {
        let (replacements, converted) = convert_resource(self.registry, envelope, false)?;
        if !converted {
            if self.is_managed(envelope) {
                self.plan.add_step(Step::start(
                    StepKind::StartManagedResource,
                    envelope.object.reference(),
                ));
            }
            return Ok(false);
        }

        self.converted_resources.insert(
            envelope.object.reference().identity(),
            replacements.iter().map(|r| r.object.reference()).collect(),
        );
        for replacement in replacements {
            let mut paused = replacement;
            paused.object.set_annotation(PAUSED_ANNOTATION, "true");
            self.plan
                .add_step(Step::apply(StepKind::NewManagedResource, &paused.object));
            self.plan.add_step(
                Step::start(StepKind::StartManagedResource, paused.object.reference()).for_object(&paused.object),
            );
            self.put(&paused, OutputKind::Resource)?;
        }
        debug!("Converted resource '{}'", envelope.name());
        Ok(true)
    }

    fn edit_composites(&mut self) -> Result<()> {
        for composite in &self.composites {
            let Some(edited) = references::edit_composite(
                &composite.object,
                &self.converted_resources,
                &self.converted_compositions,
            )?
            else {
                continue;
            };
            self.plan
                .add_step(Step::apply(StepKind::EditComposite, &edited));
            put(&mut *self.target, &composite.derive(edited), OutputKind::Composite)?;
        }
        Ok(())
    }

    fn start_composites(&mut self) {
        for composite in &self.composites {
            self.plan
                .add_step(Step::start(StepKind::StartComposite, composite.object.reference()));
        }
    }

    fn edit_claims(&mut self) -> Result<()> {
        for claim in &self.claims {
            let Some(edited) = references::edit_claim(&claim.object, &self.converted_compositions) else {
                continue;
            };
            self.plan.add_step(Step::apply(StepKind::EditClaim, &edited));
            put(&mut *self.target, &claim.derive(edited), OutputKind::Claim)?;
        }
        Ok(())
    }

    fn put(&mut self, envelope: &Envelope, output: OutputKind) -> Result<()> {
        put(&mut *self.target, envelope, output)
    }
}

fn put<T: Target>(target: &mut T, envelope: &Envelope, output: OutputKind) -> Result<()> {
    target.put(envelope).map_err(|source| MigrationError::Output {
        output,
        name: output_name(envelope),
        source,
    })
}

fn output_name(envelope: &Envelope) -> String {
    let name = envelope.name();
    if name.is_empty() {
        envelope.object.generate_name().to_string()
    } else {
        name.to_string()
    }
}

/// Runs the resource converter registered for the object's exact type identifier.
///
/// Without a converter the object is returned unchanged and not converted.
/// Outside a composition, replacements without a name or generated-name
/// prefix are given the prefix `<original name>-`.
///
/// # Errors
///
/// Returns an error if the converter fails or returns an object without a
/// type identifier.
pub(super) fn convert_resource(
    registry: &Registry,
    envelope: &Envelope,
    composition_context: bool,
) -> Result<(Vec<Envelope>, bool)> {
    let Some(converter) = registry.resource_converter(&envelope.gvk()) else {
        return Ok((vec![envelope.clone()], false));
    };

    let produced = converter
        .convert(&envelope.object)
        .map_err(|source| ConversionError::Resource {
            name: envelope.name().to_string(),
            source,
        })?;
    if produced.iter().any(|r| r.gvk().is_zero()) {
        return Err(ContractViolation::MissingTypeIdentifier {
            parent: envelope.name().to_string(),
        }
        .into());
    }

    let parent = envelope.name();
    let replacements = produced
        .into_iter()
        .map(|mut object| {
            if !composition_context && object.name().is_empty() && object.generate_name().is_empty() {
                object.set_generate_name(&format!("{parent}-"));
            }
            envelope.derive(object.sanitized())
        })
        .collect();
    Ok((replacements, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConverterError, SourceError, TargetError};
    use crate::io::{MemorySource, MemoryTarget, MockSource, MockTarget};
    use crate::registry::ConfigurationConverter;
    use crate::resource::{ConfigurationV1Alpha1, Unstructured};
    use serde_json::{Value, json};

    type Converted<T> = std::result::Result<T, ConverterError>;

    fn vpc() -> GroupVersionKind {
        GroupVersionKind::new("ec2.aws.crossplane.io", "v1beta1", "VPC")
    }

    fn upbound_vpc() -> GroupVersionKind {
        GroupVersionKind::new("ec2.aws.upbound.io", "v1beta1", "VPC")
    }

    fn upbound_subnet() -> GroupVersionKind {
        GroupVersionKind::new("ec2.aws.upbound.io", "v1beta1", "Subnet")
    }

    /// Splits a VPC into an upbound VPC and a subnet.
    fn split_vpc(r: &Unstructured) -> Converted<Vec<Unstructured>> {
        let mut vpc = r.clone();
        vpc.set_gvk(&upbound_vpc());
        let mut subnet = r.clone();
        subnet.set_gvk(&upbound_subnet());
        if !r.name().is_empty() {
            subnet.set_name(&format!("{}-subnet", r.name()));
        }
        Ok(vec![vpc, subnet])
    }

    fn managed_vpc(name: &str) -> Unstructured {
        Unstructured::new(json!({
            "apiVersion": "ec2.aws.crossplane.io/v1beta1",
            "kind": "VPC",
            "metadata": {"name": name, "uid": "6b1c"},
            "spec": {"forProvider": {"region": "us-east-1", "cidrBlock": "10.0.0.0/16"}},
            "status": {"atProvider": {"vpcId": "vpc-123"}}
        }))
    }

    fn composition() -> Unstructured {
        Unstructured::new(json!({
            "apiVersion": "apiextensions.crossplane.io/v1",
            "kind": "Composition",
            "metadata": {"name": "network"},
            "spec": {
                "compositeTypeRef": {"apiVersion": "example.org/v1", "kind": "XNetwork"},
                "resources": [{
                    "name": "vpc",
                    "base": {"apiVersion": "ec2.aws.crossplane.io/v1beta1", "kind": "VPC", "spec": {"forProvider": {"region": "us-east-1"}}},
                    "patches": [{"fromFieldPath": "spec.cidr", "toFieldPath": "spec.forProvider.cidrBlock"}]
                }]
            }
        }))
    }

    fn composite() -> Unstructured {
        Unstructured::new(json!({
            "apiVersion": "example.org/v1",
            "kind": "XNetwork",
            "metadata": {"name": "net"},
            "spec": {
                "compositionRef": {"name": "network"},
                "resourceRefs": [{"apiVersion": "ec2.aws.crossplane.io/v1beta1", "kind": "VPC", "name": "main"}]
            }
        }))
    }

    fn claim() -> Unstructured {
        Unstructured::new(json!({
            "apiVersion": "example.org/v1",
            "kind": "Network",
            "metadata": {"name": "team", "namespace": "team-a"},
            "spec": {"compositionRef": {"name": "network"}}
        }))
    }

    fn generate(registry: &Registry, objects: Vec<Unstructured>) -> (Result<()>, Plan, Vec<Envelope>) {
        let mut generator = PlanGenerator::new(
            registry,
            MemorySource::classify(objects),
            MemoryTarget::new(),
            GeneratorOptions::default(),
        )
        .with_name_generator(NameGenerator::seeded(11));
        let result = generator.generate_plan();
        let outputs = generator.target().objects().to_vec();
        (result, generator.into_plan(), outputs)
    }

    fn summary(plan: &Plan) -> Vec<(StepKind, String)> {
        plan.steps
            .iter()
            .map(|s| (s.kind, format!("{}/{}", s.object.kind, s.object.name)))
            .collect()
    }

    fn step(kind: StepKind, object: &str) -> (StepKind, String) {
        (kind, object.to_string())
    }

    #[test]
    fn test_unconverted_objects_pass_through() {
        let config_map = Unstructured::new(json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "settings"}}));
        let (result, plan, outputs) = generate(&Registry::new(), vec![managed_vpc("main"), config_map]);

        result.unwrap();
        assert!(outputs.is_empty());
        assert_eq!(
            summary(&plan),
            vec![
                step(StepKind::PauseManagedResource, "VPC/main"),
                step(StepKind::StartManagedResource, "VPC/main"),
            ]
        );
    }

    #[test]
    fn test_registered_managed_kinds_are_paused_and_started() {
        let bucket = GroupVersionKind::new("s3.aws.crossplane.io", "v1beta1", "Bucket");
        let mut registry = Registry::new();
        registry.register_managed_kinds([bucket]);

        let object = Unstructured::new(json!({
            "apiVersion": "s3.aws.crossplane.io/v1beta1", "kind": "Bucket", "metadata": {"name": "logs"}
        }));
        let (result, plan, _) = generate(&registry, vec![object]);

        result.unwrap();
        assert_eq!(plan.count(StepKind::PauseManagedResource), 1);
        assert_eq!(plan.count(StepKind::StartManagedResource), 1);
    }

    #[test]
    fn test_missing_type_identifier_fails_before_any_step() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), |r: &Unstructured| -> Converted<Vec<Unstructured>> {
            Ok(vec![Unstructured::new(json!({"metadata": {"name": r.name()}}))])
        });

        let (result, plan, outputs) = generate(&registry, vec![managed_vpc("main")]);
        let err = result.unwrap_err();

        assert_eq!(err.stage(), Some(&Stage::MigrateResource));
        assert!(matches!(
            err.root(),
            MigrationError::Contract(ContractViolation::MissingTypeIdentifier { parent }) if parent == "main"
        ));
        assert!(plan.is_empty());
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_converted_resource_is_replaced() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), |r: &Unstructured| -> Converted<Vec<Unstructured>> {
            let mut vpc = r.clone();
            vpc.set_gvk(&upbound_vpc());
            let mut subnet = Unstructured::with_gvk(&upbound_subnet(), "");
            subnet.set("spec.forProvider.cidrBlock", json!("10.0.1.0/24"));
            Ok(vec![vpc, subnet])
        });

        let (result, plan, outputs) = generate(&registry, vec![managed_vpc("main")]);
        result.unwrap();

        assert_eq!(
            summary(&plan),
            vec![
                step(StepKind::PauseManagedResource, "VPC/main"),
                step(StepKind::NewManagedResource, "VPC/main"),
                step(StepKind::NewManagedResource, "Subnet/"),
                step(StepKind::OrphanManagedResource, "VPC/main"),
                step(StepKind::DeleteManagedResource, "VPC/main"),
                step(StepKind::StartManagedResource, "VPC/main"),
                step(StepKind::StartManagedResource, "Subnet/"),
            ]
        );

        // The unnamed replacement is prefixed with the original name.
        let subnet = plan.steps_of(StepKind::NewManagedResource).nth(1).unwrap();
        assert_eq!(subnet.object.generate_name.as_deref(), Some("main-"));

        // New resources are created paused and without runtime fields.
        let manifest = Unstructured::new(plan.steps[1].manifest.clone().unwrap());
        assert_eq!(manifest.get_str("apiVersion"), Some("ec2.aws.upbound.io/v1beta1"));
        assert_eq!(manifest.get_str("metadata.annotations[crossplane.io/paused]"), Some("true"));
        assert!(manifest.get("metadata.uid").is_none());
        assert!(manifest.get("status").is_none());

        assert_eq!(outputs.len(), 2);
        assert_eq!(plan.steps[3].patch, Some(json!({"spec": {"deletionPolicy": "Orphan"}})));
    }

    #[test]
    fn test_composition_and_resources_end_to_end() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), split_vpc);

        let (result, plan, outputs) = generate(&registry, vec![composition(), managed_vpc("main")]);
        result.unwrap();

        let compositions: Vec<_> = plan.steps_of(StepKind::NewComposition).collect();
        assert_eq!(compositions.len(), 1);
        assert_eq!(compositions[0].object.name, "network-migrated");

        let migrated = Unstructured::new(compositions[0].manifest.clone().unwrap());
        let templates = migrated.get("spec.resources").and_then(Value::as_array).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0]["name"], "vpc");
        assert_eq!(templates[0]["base"]["apiVersion"], "ec2.aws.upbound.io/v1beta1");
        assert_eq!(templates[1]["base"]["kind"], "Subnet");
        let subnet_name = templates[1]["name"].as_str().unwrap();
        assert!(subnet_name.starts_with("vpc-") && subnet_name.len() == "vpc-".len() + 5);

        assert_eq!(
            summary(&plan)
                .into_iter()
                .filter(|(kind, _)| matches!(kind, StepKind::NewManagedResource | StepKind::StartManagedResource))
                .collect::<Vec<_>>(),
            vec![
                step(StepKind::NewManagedResource, "VPC/main"),
                step(StepKind::NewManagedResource, "Subnet/main-subnet"),
                step(StepKind::StartManagedResource, "VPC/main"),
                step(StepKind::StartManagedResource, "Subnet/main-subnet"),
            ]
        );
        assert!(outputs.iter().any(|o| o.name() == "network-migrated"));
    }

    #[test]
    fn test_composites_and_claims_follow_migrated_composition() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), split_vpc);

        let (result, plan, outputs) = generate(
            &registry,
            vec![composition(), managed_vpc("main"), composite(), claim()],
        );
        result.unwrap();

        let kinds: Vec<_> = plan.steps.iter().map(|s| s.kind).collect();
        let position = |kind| kinds.iter().position(|k| *k == kind).unwrap();
        assert!(position(StepKind::PauseComposite) < position(StepKind::EditComposite));
        assert!(position(StepKind::EditComposite) < position(StepKind::StartComposite));

        let edited = Unstructured::new(plan.steps_of(StepKind::EditComposite).next().unwrap().manifest.clone().unwrap());
        assert_eq!(edited.get_str("spec.compositionRef.name"), Some("network-migrated"));
        assert_eq!(
            edited.get("spec.resourceRefs"),
            Some(&json!([
                {"apiVersion": "ec2.aws.upbound.io/v1beta1", "kind": "VPC", "name": "main"},
                {"apiVersion": "ec2.aws.upbound.io/v1beta1", "kind": "Subnet", "name": "main-subnet"}
            ]))
        );

        let claim_edit = plan.steps_of(StepKind::EditClaim).next().unwrap();
        assert_eq!(claim_edit.object.namespace.as_deref(), Some("team-a"));
        let edited_claim = Unstructured::new(claim_edit.manifest.clone().unwrap());
        assert_eq!(edited_claim.get_str("spec.compositionRef.name"), Some("network-migrated"));

        assert!(outputs.iter().any(|o| o.name() == "net"));
        assert!(outputs.iter().any(|o| o.name() == "team"));
    }

    #[test]
    fn test_composites_are_paused_and_started_without_conversion() {
        let (result, plan, outputs) = generate(&Registry::new(), vec![composite(), claim()]);
        result.unwrap();

        assert_eq!(
            summary(&plan),
            vec![
                step(StepKind::PauseComposite, "XNetwork/net"),
                step(StepKind::StartComposite, "XNetwork/net"),
            ]
        );
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_generation_is_idempotent_without_converters() {
        let objects = vec![composition(), managed_vpc("main"), managed_vpc("backup"), composite(), claim()];
        let (first, first_plan, _) = generate(&Registry::new(), objects.clone());
        let (second, second_plan, _) = generate(&Registry::new(), objects);

        first.unwrap();
        second.unwrap();
        assert_eq!(first_plan.steps, second_plan.steps);
        assert_eq!(first_plan.fingerprint(), second_plan.fingerprint());
    }

    #[test]
    fn test_unnamed_replacements_each_get_their_own_steps() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), |r: &Unstructured| -> Converted<Vec<Unstructured>> {
            let subnets = ["a", "b"].map(|zone| {
                let mut subnet = Unstructured::with_gvk(&upbound_subnet(), "");
                subnet.set("spec.forProvider.availabilityZone", json!(format!("us-east-1{zone}")));
                subnet.set("spec.forProvider.vpcIdRef.name", json!(r.name()));
                subnet
            });
            Ok(subnets.to_vec())
        });

        let (result, plan, outputs) = generate(&registry, vec![managed_vpc("main"), managed_vpc("backup")]);
        result.unwrap();

        assert_eq!(outputs.len(), 4);
        assert_eq!(plan.count(StepKind::NewManagedResource), 4);
        assert_eq!(plan.count(StepKind::StartManagedResource), 4);

        let prefixes: Vec<_> = plan
            .steps_of(StepKind::StartManagedResource)
            .map(|s| s.object.generate_name.clone().unwrap())
            .collect();
        assert_eq!(prefixes, vec!["main-", "main-", "backup-", "backup-"]);
    }

    #[test]
    fn test_each_generation_starts_from_an_empty_plan() {
        let registry = Registry::new();
        let mut generator = PlanGenerator::new(
            &registry,
            MemorySource::classify([managed_vpc("main")]),
            MemoryTarget::new(),
            GeneratorOptions::default(),
        );

        generator.generate_plan().unwrap();
        assert_eq!(generator.plan().step_count(), 2);

        // The source is drained, so a second run finds nothing to migrate.
        generator.generate_plan().unwrap();
        assert!(generator.plan().is_empty());
    }

    #[test]
    fn test_repeated_objects_do_not_repeat_steps() {
        let (result, plan, _) = generate(&Registry::new(), vec![managed_vpc("main"), managed_vpc("main")]);
        result.unwrap();
        assert_eq!(plan.step_count(), 2);
    }

    #[test]
    fn test_matching_configuration_converter_marks_conversion() {
        // A converter that matches but edits nothing still yields an edit
        // step; this imprecision is accepted.
        struct Noop;
        impl ConfigurationConverter for Noop {}

        let mut registry = Registry::new();
        registry.register_configuration_converter(".*", Noop).unwrap();

        let configuration = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1",
            "kind": "Configuration",
            "metadata": {"name": "platform"}
        }));
        let (result, plan, outputs) = generate(&registry, vec![configuration]);
        result.unwrap();

        let edit = plan.steps_of(StepKind::EditConfiguration).next().unwrap();
        assert_eq!(edit.object.name, "platform");
        assert_eq!(edit.version.as_deref(), Some("v1"));
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_configuration_converters_use_declared_version() {
        struct Upgrade;
        impl ConfigurationConverter for Upgrade {
            fn convert_v1alpha1(&self, configuration: &mut ConfigurationV1Alpha1) -> Converted<()> {
                for dependency in &mut configuration.spec.depends_on {
                    dependency.provider = Some(String::from("xpkg.upbound.io/upbound/provider-aws-ec2"));
                    dependency.version = String::from(">=v0.37.0");
                }
                Ok(())
            }
        }

        let mut registry = Registry::new();
        registry.register_configuration_converter("^platform$", Upgrade).unwrap();
        let configuration = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1alpha1",
            "kind": "Configuration",
            "metadata": {"name": "platform"},
            "spec": {"dependsOn": [{"provider": "xpkg.upbound.io/crossplane-contrib/provider-aws", "version": ">=v0.33.0"}]}
        }));
        let other = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1",
            "kind": "Configuration",
            "metadata": {"name": "unrelated"}
        }));

        let (result, plan, _) = generate(&registry, vec![configuration, other]);
        result.unwrap();

        assert_eq!(plan.count(StepKind::EditConfiguration), 1);
        let edit = plan.steps_of(StepKind::EditConfiguration).next().unwrap();
        assert_eq!(edit.version.as_deref(), Some("v1alpha1"));
        let manifest = Unstructured::new(edit.manifest.clone().unwrap());
        assert_eq!(
            manifest.get_str("spec.dependsOn[0].provider"),
            Some("xpkg.upbound.io/upbound/provider-aws-ec2")
        );
    }

    #[test]
    fn test_configuration_converter_errors_are_staged() {
        struct Broken;
        impl ConfigurationConverter for Broken {
            fn convert_v1(&self, _: &mut crate::resource::ConfigurationV1) -> Converted<()> {
                Err(ConverterError::new("unsupported dependency"))
            }
        }

        let mut registry = Registry::new();
        registry.register_configuration_converter(".*", Broken).unwrap();
        let configuration = Unstructured::new(json!({
            "apiVersion": "meta.pkg.crossplane.io/v1", "kind": "Configuration", "metadata": {"name": "platform"}
        }));

        let (result, _, _) = generate(&registry, vec![configuration]);
        let err = result.unwrap_err();
        assert_eq!(
            err.stage(),
            Some(&Stage::MigrateConfiguration {
                name: String::from("platform")
            })
        );
        assert!(err.to_string().contains("unsupported dependency"));
    }

    #[test]
    fn test_source_has_next_failure() {
        let mut source = MockSource::new();
        source
            .expect_has_next()
            .times(1)
            .returning(|| Err(SourceError::Other(String::from("connection reset"))));

        let registry = Registry::new();
        let mut generator = PlanGenerator::new(&registry, source, MemoryTarget::new(), GeneratorOptions::default());
        let err = generator.generate_plan().unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Source {
                operation: SourceOperation::HasNext,
                ..
            }
        ));
    }

    #[test]
    fn test_source_next_failure() {
        let mut source = MockSource::new();
        source.expect_has_next().returning(|| Ok(true));
        source
            .expect_next()
            .times(1)
            .returning(|| Err(SourceError::parse("vpc.yaml", "invalid indentation")));

        let registry = Registry::new();
        let mut generator = PlanGenerator::new(&registry, source, MemoryTarget::new(), GeneratorOptions::default());
        let err = generator.generate_plan().unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Source {
                operation: SourceOperation::Next,
                source: SourceError::Parse { .. }
            }
        ));
    }

    #[test]
    fn test_output_failure_still_commits_steps() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), split_vpc);

        let mut target = MockTarget::new();
        target
            .expect_put()
            .times(1)
            .returning(|_| Err(TargetError::Other(String::from("disk full"))));

        let mut generator = PlanGenerator::new(
            &registry,
            MemorySource::classify([managed_vpc("main")]),
            target,
            GeneratorOptions::default(),
        );
        let err = generator.generate_plan().unwrap_err();

        assert_eq!(err.stage(), Some(&Stage::MigrateResource));
        assert!(matches!(
            err.root(),
            MigrationError::Output {
                output: OutputKind::Resource,
                name,
                ..
            } if name == "main"
        ));
        assert_eq!(generator.plan().pending_count(), 0);
        assert_eq!(
            summary(generator.plan()),
            vec![
                step(StepKind::NewManagedResource, "VPC/main"),
                step(StepKind::StartManagedResource, "VPC/main"),
            ]
        );
    }

    #[test]
    fn test_malformed_composite_references_abort_generation() {
        let mut registry = Registry::new();
        registry.register_resource_converter(vpc(), split_vpc);
        let mut broken = composite();
        broken.set("spec.resourceRefs", json!("main"));

        let (result, plan, _) = generate(&registry, vec![managed_vpc("main"), broken]);
        let err = result.unwrap_err();

        assert_eq!(err.stage(), Some(&Stage::EditComposites));
        assert!(matches!(
            err.root(),
            MigrationError::Conversion(ConversionError::InvalidReference { .. })
        ));
        assert_eq!(plan.count(StepKind::PauseComposite), 1);
        assert_eq!(plan.count(StepKind::StartComposite), 0);
    }
}
