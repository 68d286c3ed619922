//! Targets for converted manifests.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::TargetError;
use crate::resource::Envelope;

/// Receives converted and edited objects during generation.
#[cfg_attr(test, mockall::automock)]
pub trait Target {
    /// Stores one object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be stored.
    fn put(&mut self, object: &Envelope) -> Result<(), TargetError>;
}

impl<T: Target + ?Sized> Target for &mut T {
    fn put(&mut self, object: &Envelope) -> Result<(), TargetError> {
        (**self).put(object)
    }
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn put(&mut self, object: &Envelope) -> Result<(), TargetError> {
        (**self).put(object)
    }
}

/// Writes one YAML file per object into a directory.
///
/// Files are named `<kind>.<group>_<name>.yaml`, with the kind in lower
/// case and `.<group>` left out for the core group. Namespaced objects go
/// into a subdirectory named after their namespace. Objects that only carry
/// a generated-name prefix are written as `<kind>.<group>_<prefix>_<n>.yaml`,
/// numbered in the order they arrive. Object names cannot contain `_`, so
/// the two forms never collide.
#[derive(Debug)]
pub struct FileSystemTarget {
    dir: PathBuf,
    unnamed: usize,
    written: Vec<PathBuf>,
}

impl FileSystemTarget {
    /// Creates a target writing into `dir`, which is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            unnamed: 0,
            written: Vec::new(),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the files written so far.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn relative_path(&mut self, object: &Envelope) -> PathBuf {
        let gvk = object.gvk();
        let kind = if gvk.kind.is_empty() {
            String::from("object")
        } else {
            gvk.kind.to_lowercase()
        };
        let stem = if gvk.group.is_empty() {
            kind
        } else {
            format!("{kind}.{}", gvk.group)
        };

        let name = object.name();
        let file_name = if name.is_empty() {
            self.unnamed += 1;
            let prefix = object.object.generate_name().trim_end_matches('-');
            format!("{stem}_{prefix}_{}.yaml", self.unnamed)
        } else {
            format!("{stem}_{name}.yaml")
        };

        object
            .object
            .namespace()
            .map_or_else(|| PathBuf::from(&file_name), |ns| Path::new(ns).join(&file_name))
    }

    fn io_error(path: &Path, e: &std::io::Error) -> TargetError {
        TargetError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}

impl Target for FileSystemTarget {
    fn put(&mut self, object: &Envelope) -> Result<(), TargetError> {
        let content = serde_yaml::to_string(&object.object).map_err(|e| TargetError::serialize(e.to_string()))?;
        let relative = self.relative_path(object);
        let path = self.dir.join(relative);

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            debug!("Creating output directory: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, &e))?;
        }

        // Write to a temporary file first, then rename into place
        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, content).map_err(|e| Self::io_error(&temp_path, &e))?;
        std::fs::rename(&temp_path, &path).map_err(|e| Self::io_error(&path, &e))?;

        info!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Records objects in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
    objects: Vec<Envelope>,
}

impl MemoryTarget {
    /// Creates an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded objects in arrival order.
    #[must_use]
    pub fn objects(&self) -> &[Envelope] {
        &self.objects
    }

    /// Returns the last recorded object with the given kind and name.
    #[must_use]
    pub fn find(&self, kind: &str, name: &str) -> Option<&Envelope> {
        self.objects
            .iter()
            .rev()
            .find(|e| e.object.get_str("kind") == Some(kind) && e.name() == name)
    }
}

impl Target for MemoryTarget {
    fn put(&mut self, object: &Envelope) -> Result<(), TargetError> {
        self.objects.push(object.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::read_documents;
    use crate::resource::{Category, Unstructured};
    use serde_json::json;

    fn envelope(value: serde_json::Value) -> Envelope {
        Envelope::new(Unstructured::new(value), Category::ManagedResource)
    }

    #[test]
    fn test_filesystem_target_writes_one_file_per_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = FileSystemTarget::new(dir.path().join("out"));

        target
            .put(&envelope(json!({"apiVersion": "ec2.aws.upbound.io/v1beta1", "kind": "VPC", "metadata": {"name": "main"}})))
            .unwrap();
        target
            .put(&envelope(json!({"apiVersion": "ec2.aws.upbound.io/v1beta1", "kind": "Subnet", "metadata": {"generateName": "main-"}})))
            .unwrap();

        let written = target.written().to_vec();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("vpc.ec2.aws.upbound.io_main.yaml"));
        assert!(written[1].ends_with("subnet.ec2.aws.upbound.io_main_1.yaml"));

        let read_back = read_documents(&written[0]).unwrap();
        assert_eq!(read_back[0].name(), "main");
        assert!(!written[0].with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_filesystem_target_separates_namespaces_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = FileSystemTarget::new(dir.path());

        for namespace in ["team-a", "team-b"] {
            target
                .put(&envelope(json!({
                    "apiVersion": "example.org/v1", "kind": "Network",
                    "metadata": {"name": "team", "namespace": namespace}
                })))
                .unwrap();
        }
        target
            .put(&envelope(json!({"apiVersion": "ec2.aws.crossplane.io/v1beta1", "kind": "VPC", "metadata": {"name": "main"}})))
            .unwrap();
        target
            .put(&envelope(json!({"apiVersion": "ec2.aws.upbound.io/v1beta1", "kind": "VPC", "metadata": {"name": "main"}})))
            .unwrap();
        target
            .put(&envelope(json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "settings"}})))
            .unwrap();

        let written = target.written().to_vec();
        assert_eq!(written[0], dir.path().join("team-a").join("network.example.org_team.yaml"));
        assert_eq!(written[1], dir.path().join("team-b").join("network.example.org_team.yaml"));
        assert_eq!(written[4], dir.path().join("configmap_settings.yaml"));

        let mut unique = written.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
        assert!(written.iter().all(|path| path.exists()));
        assert_eq!(read_documents(&written[1]).unwrap()[0].namespace(), Some("team-b"));
    }

    #[test]
    fn test_memory_target_find() {
        let mut target = MemoryTarget::new();
        target
            .put(&envelope(json!({"kind": "VPC", "metadata": {"name": "a"}})))
            .unwrap();

        assert!(target.find("VPC", "a").is_some());
        assert!(target.find("VPC", "b").is_none());
        assert_eq!(target.objects().len(), 1);
    }
}
