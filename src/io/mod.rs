//! Manifest sources and targets.
//!
//! The planner reads objects from a [`Source`] and writes converted or
//! edited objects to a [`Target`]. Filesystem and in-memory
//! implementations are provided for both.

mod source;
mod target;

pub use source::{FileSystemSource, MemorySource, Source, read_documents};
pub use target::{FileSystemTarget, MemoryTarget, Target};

#[cfg(test)]
pub use source::MockSource;
#[cfg(test)]
pub use target::MockTarget;
