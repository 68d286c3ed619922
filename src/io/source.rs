//! Manifest sources.

use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::SourceError;
use crate::resource::{Envelope, Unstructured};

/// A stream of classified manifests.
///
/// Generation pulls objects with [`Source::has_next`] and [`Source::next`]
/// until the source reports it is exhausted.
#[cfg_attr(test, mockall::automock)]
pub trait Source {
    /// Returns true if another object is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot determine whether more objects follow.
    fn has_next(&mut self) -> Result<bool, SourceError>;

    /// Returns the next object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be read or the source is exhausted.
    fn next(&mut self) -> Result<Envelope, SourceError>;
}

impl<S: Source + ?Sized> Source for &mut S {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        (**self).has_next()
    }

    fn next(&mut self) -> Result<Envelope, SourceError> {
        (**self).next()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        (**self).has_next()
    }

    fn next(&mut self) -> Result<Envelope, SourceError> {
        (**self).next()
    }
}

/// Reads `.yaml` and `.yml` files below a directory.
///
/// Files are visited in path order and parsed one at a time as the stream
/// advances. Each YAML document becomes one object; empty documents are
/// skipped.
#[derive(Debug)]
pub struct FileSystemSource {
    files: VecDeque<PathBuf>,
    buffered: VecDeque<Envelope>,
}

impl FileSystemSource {
    /// Creates a source over every manifest file below `root`.
    ///
    /// `root` may also name a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree cannot be walked.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SourceError> {
        let root = root.as_ref();
        let mut files = VecDeque::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io {
                path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                message: e.to_string(),
            })?;
            if entry.file_type().is_file() && is_manifest(entry.path()) {
                files.push_back(entry.into_path());
            }
        }

        debug!("Found {} manifest files below {}", files.len(), root.display());
        Ok(Self {
            files,
            buffered: VecDeque::new(),
        })
    }

    /// Returns the number of files not yet read.
    #[must_use]
    pub fn remaining_files(&self) -> usize {
        self.files.len()
    }
}

impl Source for FileSystemSource {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        while self.buffered.is_empty() {
            let Some(path) = self.files.pop_front() else {
                return Ok(false);
            };
            for object in read_documents(&path)? {
                let mut envelope = Envelope::classify(object);
                envelope.metadata.path = Some(path.clone());
                self.buffered.push_back(envelope);
            }
        }
        Ok(true)
    }

    fn next(&mut self) -> Result<Envelope, SourceError> {
        if !self.has_next()? {
            return Err(SourceError::Exhausted);
        }
        self.buffered.pop_front().ok_or(SourceError::Exhausted)
    }
}

/// Serves objects from memory, in order.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    objects: VecDeque<Envelope>,
}

impl MemorySource {
    /// Creates a source over already classified objects.
    #[must_use]
    pub fn new(objects: impl IntoIterator<Item = Envelope>) -> Self {
        Self {
            objects: objects.into_iter().collect(),
        }
    }

    /// Creates a source that classifies each object by its shape.
    #[must_use]
    pub fn classify(objects: impl IntoIterator<Item = Unstructured>) -> Self {
        Self::new(objects.into_iter().map(Envelope::classify))
    }
}

impl Source for MemorySource {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        Ok(!self.objects.is_empty())
    }

    fn next(&mut self) -> Result<Envelope, SourceError> {
        self.objects.pop_front().ok_or(SourceError::Exhausted)
    }
}

/// Parses every non-empty YAML document in a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a document is not valid YAML.
pub fn read_documents(path: &Path) -> Result<Vec<Unstructured>, SourceError> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(&content).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| SourceError::parse(format!("{} (document {})", path.display(), index + 1), e.to_string()))?;
        if value.is_object() {
            objects.push(Unstructured::new(value));
        }
    }
    Ok(objects)
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}
