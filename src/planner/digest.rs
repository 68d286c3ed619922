//! Content digests for step keys and plan fingerprints.
//!
//! Documents are hashed through their compact JSON encoding. Object keys
//! serialize in sorted order, so equal documents always hash equally.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::plan::Step;

/// Hasher for manifests and step lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestHasher;

impl ManifestHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the SHA-256 digest of a document.
    #[must_use]
    pub fn hash_manifest(&self, manifest: &Value) -> String {
        let mut hasher = Sha256::new();
        update_value(&mut hasher, manifest);
        hex::encode(hasher.finalize())
    }

    /// Computes the SHA-256 digest of an ordered step list.
    ///
    /// The digest covers each step's kind, target, patch, manifest and
    /// version, in order.
    #[must_use]
    pub fn hash_steps(&self, steps: &[Step]) -> String {
        let mut hasher = Sha256::new();

        for step in steps {
            hasher.update(step.kind.as_str().as_bytes());
            hasher.update(step.object.api_version.as_bytes());
            hasher.update(step.object.kind.as_bytes());
            if let Some(namespace) = &step.object.namespace {
                hasher.update(namespace.as_bytes());
            }
            hasher.update(step.object.name.as_bytes());
            if let Some(prefix) = &step.object.generate_name {
                hasher.update(prefix.as_bytes());
            }
            if let Some(patch) = &step.patch {
                update_value(&mut hasher, patch);
            }
            if let Some(manifest) = &step.manifest {
                update_value(&mut hasher, manifest);
            }
            if let Some(version) = &step.version {
                hasher.update(version.as_bytes());
            }
            // Separates steps so adjacent fields cannot run together.
            hasher.update([0u8]);
        }

        hex::encode(hasher.finalize())
    }

    /// Returns the first 8 characters of a digest, for display.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

fn update_value(hasher: &mut Sha256, value: &Value) {
    // Display on a Value writes compact JSON and cannot fail.
    hasher.update(value.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan::StepKind;
    use crate::resource::ObjectReference;
    use serde_json::json;

    fn step(kind: StepKind, name: &str) -> Step {
        Step {
            kind,
            object: ObjectReference {
                api_version: String::from("ec2.aws.upbound.io/v1beta1"),
                kind: String::from("VPC"),
                name: name.to_string(),
                namespace: None,
                generate_name: None,
            },
            patch: None,
            manifest: None,
            version: None,
            digest: None,
        }
    }

    #[test]
    fn test_manifest_hash_ignores_key_order() {
        let hasher = ManifestHasher::new();
        let a: Value = serde_json::from_str(r#"{"kind": "VPC", "apiVersion": "v1"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"apiVersion": "v1", "kind": "VPC"}"#).unwrap();

        assert_eq!(hasher.hash_manifest(&a), hasher.hash_manifest(&b));
        assert_ne!(hasher.hash_manifest(&a), hasher.hash_manifest(&json!({"kind": "Subnet"})));
    }

    #[test]
    fn test_step_hash_depends_on_order() {
        let hasher = ManifestHasher::new();
        let first = vec![step(StepKind::PauseManagedResource, "a"), step(StepKind::PauseManagedResource, "b")];
        let second = vec![step(StepKind::PauseManagedResource, "b"), step(StepKind::PauseManagedResource, "a")];

        assert_eq!(hasher.hash_steps(&first), hasher.hash_steps(&first.clone()));
        assert_ne!(hasher.hash_steps(&first), hasher.hash_steps(&second));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ManifestHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
    }
}
