//! Boundaries to the binary format and the module merger.
//!
//! The engine never touches bytes. Reading a module, writing it back, and physically
//! merging two modules into one are delegated to implementations of [`ModuleReader`],
//! [`ModuleWriter`] and [`MergeService`]. The crate ships in-memory implementations so the
//! full pipeline runs without a binary format:
//!
//! - [`MemoryStore`] - A concurrent path-keyed store acting as both reader and writer
//! - [`UnionMerge`] - Merges modules held by a [`MemoryStore`] into a single module
//!
//! # Examples
//!
//! ```rust
//! use std::{path::Path, sync::Arc};
//! use cilweave::{
//!     file::{MemoryStore, MergeRequest, MergeService, ModuleReader, UnionMerge},
//!     metadata::{ModuleBuilder, TypeBuilder},
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert(ModuleBuilder::new("Library").add_type(TypeBuilder::new("Demo.Greeter")).build()?);
//! store.insert(ModuleBuilder::new("Proxies").add_type(TypeBuilder::new("Demo.GreeterProxy")).build()?);
//!
//! let merge = UnionMerge::new(store.clone());
//! merge.merge(&MergeRequest::new("Library.dll", "Proxies.dll", "scratch/Library.dll"))?;
//!
//! let merged = store.read(Path::new("scratch/Library.dll"))?;
//! assert_eq!(merged.name(), "Library");
//! assert_eq!(merged.types()?.len(), 2);
//! # Ok::<(), cilweave::Error>(())
//! ```

mod memory;
mod merge;

pub use memory::MemoryStore;
pub use merge::UnionMerge;

use std::path::{Path, PathBuf};

use crate::{metadata::Module, Result};

/// Reads modules from some backing storage.
pub trait ModuleReader: Send + Sync {
    /// Reads the module at `path`.
    ///
    /// Implementations may return a lazily loaded [`Module`]; parse errors then surface on
    /// the first structural query.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if nothing can be read at `path`.
    fn read(&self, path: &Path) -> Result<Module>;
}

/// Writes modules to some backing storage.
pub trait ModuleWriter: Send + Sync {
    /// Writes `module` to `destination`, signing it with `signing_key` when given.
    ///
    /// # Errors
    ///
    /// Implementation specific; nothing may be left at `destination` on failure.
    fn write(&self, module: &Module, destination: &Path, signing_key: Option<&Path>)
        -> Result<()>;
}

/// What to merge and where to put the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// The module whose identity the merged module keeps
    pub primary: PathBuf,
    /// Modules merged into the primary one
    pub others: Vec<PathBuf>,
    /// Where the merged module is written
    pub output: PathBuf,
    /// Directories searched for referenced modules
    pub search_directories: Vec<PathBuf>,
    /// Key the merged module is signed with
    pub signing_key: Option<PathBuf>,
}

impl MergeRequest {
    /// Merges `other` into `primary`, writing `output`
    pub fn new(
        primary: impl Into<PathBuf>,
        other: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        MergeRequest {
            primary: primary.into(),
            others: vec![other.into()],
            output: output.into(),
            search_directories: Vec::new(),
            signing_key: None,
        }
    }

    /// Sets the directories searched for referenced modules
    #[must_use]
    pub fn search_directories(mut self, directories: Vec<PathBuf>) -> Self {
        self.search_directories = directories;
        self
    }

    /// Sets the key the merged module is signed with
    #[must_use]
    pub fn signing_key(mut self, key: Option<PathBuf>) -> Self {
        self.signing_key = key;
        self
    }
}

/// Physically merges modules into one.
pub trait MergeService: Send + Sync {
    /// Performs `request`; the merged module is afterwards readable at `request.output`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Merge`] when the inputs cannot be combined and propagates
    /// read and write failures.
    fn merge(&self, request: &MergeRequest) -> Result<()>;
}
