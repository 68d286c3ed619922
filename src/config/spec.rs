//! Configuration specification types for the migration planner.
//!
//! This module defines the structs that map to the `xpmigrate.yaml` file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, MigrationError, Result};
use crate::io::read_documents;
use crate::planner::{GeneratorOptions, NameGenerator};
use crate::registry::{ApiRewrite, Registry};
use crate::resource::GroupVersionKind;

/// Kind of the documents read from CRD files.
const CRD_KIND: &str = "CustomResourceDefinition";

/// The root configuration structure for a migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Fail generation on composed-template patches the target schema rejects.
    #[serde(default)]
    pub error_on_invalid_patch_schema: bool,
    /// Source type identifiers exempt from template defaulting.
    #[serde(default)]
    pub skip_gvks: Vec<GroupVersionKind>,
    /// Seed for generated name suffixes.
    #[serde(default)]
    pub seed: Option<u64>,
    /// API rewrites registered as resource converters.
    #[serde(default)]
    pub rewrites: Vec<ApiRewrite>,
    /// CRD manifests describing managed kinds and their schemas.
    #[serde(default)]
    pub crds: Vec<PathBuf>,
}

impl MigrationConfig {
    /// Returns the generator options described by this configuration.
    #[must_use]
    pub fn to_options(&self) -> GeneratorOptions {
        GeneratorOptions::default()
            .with_error_on_invalid_patch_schema(self.error_on_invalid_patch_schema)
            .with_skip_gvks(self.skip_gvks.clone())
    }

    /// Returns a name generator, seeded if a seed is configured.
    #[must_use]
    pub fn name_generator(&self) -> NameGenerator {
        self.seed.map_or_else(NameGenerator::from_entropy, NameGenerator::seeded)
    }

    /// Returns the CRD paths, with relative paths resolved against `base`.
    #[must_use]
    pub fn crd_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.crds
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }

    /// Builds a registry holding the configured rewrites and CRDs.
    ///
    /// Documents in CRD files that are not `CustomResourceDefinition`s are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a CRD file cannot be read or a CRD is malformed.
    pub fn build_registry(&self, base: &Path) -> Result<Registry> {
        let mut registry = Registry::new();
        for rewrite in &self.rewrites {
            debug!("Registering rewrite {} -> {}", rewrite.from, rewrite.target());
            registry.register_rewrite(rewrite.clone());
        }

        for path in self.crd_paths(base) {
            let documents = read_documents(&path).map_err(|e| {
                MigrationError::Config(ConfigError::ParseError {
                    message: format!("Failed to read CRD file: {e}"),
                    location: Some(path.display().to_string()),
                })
            })?;
            for crd in documents.iter().filter(|d| d.get_str("kind") == Some(CRD_KIND)) {
                let gvks = registry.register_crd(crd)?;
                debug!("Registered {} versions of {}", gvks.len(), crd.name());
            }
        }

        info!(
            "Registry ready with {} rewrites and {} CRD files",
            self.rewrites.len(),
            self.crds.len()
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_options() {
        let config = MigrationConfig {
            error_on_invalid_patch_schema: true,
            skip_gvks: vec![GroupVersionKind::new("", "v1beta1", "VPC")],
            ..MigrationConfig::default()
        };

        let options = config.to_options();
        assert!(options.error_on_invalid_patch_schema);
        assert_eq!(options.skip_gvks.len(), 1);
    }

    #[test]
    fn test_seeded_name_generators_agree() {
        let config = MigrationConfig {
            seed: Some(42),
            ..MigrationConfig::default()
        };
        assert_eq!(config.name_generator().suffix(), config.name_generator().suffix());
    }

    #[test]
    fn test_crd_paths_resolve_relative_entries() {
        let config = MigrationConfig {
            crds: vec![PathBuf::from("crds/vpc.yaml"), PathBuf::from("/opt/crds/subnet.yaml")],
            ..MigrationConfig::default()
        };

        let paths = config.crd_paths(Path::new("/work"));
        assert_eq!(paths[0], PathBuf::from("/work/crds/vpc.yaml"));
        assert_eq!(paths[1], PathBuf::from("/opt/crds/subnet.yaml"));
    }

    #[test]
    fn test_build_registry_from_rewrites_and_crds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vpc.yaml"),
            r"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: vpcs.ec2.aws.upbound.io
spec:
  group: ec2.aws.upbound.io
  names:
    kind: VPC
    categories: [crossplane, managed, aws]
  versions:
    - name: v1beta1
      schema:
        openAPIV3Schema:
          type: object
          properties:
            spec:
              type: object
              properties:
                forProvider:
                  type: object
                  properties:
                    cidrBlock:
                      type: string
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unrelated
",
        )
        .unwrap();

        let vpc = GroupVersionKind::new("ec2.aws.crossplane.io", "v1beta1", "VPC");
        let config = MigrationConfig {
            rewrites: vec![ApiRewrite {
                from: vpc.clone(),
                to: crate::registry::GvkOverride {
                    group: Some(String::from("ec2.aws.upbound.io")),
                    ..Default::default()
                },
            }],
            crds: vec![PathBuf::from("vpc.yaml")],
            ..MigrationConfig::default()
        };

        let registry = config.build_registry(dir.path()).unwrap();
        let upbound = GroupVersionKind::new("ec2.aws.upbound.io", "v1beta1", "VPC");
        assert!(registry.resource_converter(&vpc).is_some());
        assert!(registry.is_managed_kind(&upbound));
        assert!(registry.schema(&upbound).unwrap().accepts("spec.forProvider.cidrBlock"));
    }

    #[test]
    fn test_build_registry_missing_crd_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig {
            crds: vec![PathBuf::from("missing.yaml")],
            ..MigrationConfig::default()
        };
        assert!(matches!(
            config.build_registry(dir.path()),
            Err(MigrationError::Config(ConfigError::ParseError { .. }))
        ));
    }
}
