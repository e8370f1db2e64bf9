//! Concurrent in-memory module storage.

use std::{
    io,
    path::{Path, PathBuf},
};

use dashmap::DashMap;

use crate::{
    file::{ModuleReader, ModuleWriter},
    metadata::Module,
    Error, Result,
};

/// A module stored together with the key it was signed with
#[derive(Debug, Clone)]
struct StoredModule {
    module: Module,
    signing_key: Option<PathBuf>,
}

/// Path-keyed module storage, usable as both [`ModuleReader`] and [`ModuleWriter`].
///
/// Shared between threads through an `Arc`; concurrent pairs of
/// [`crate::Tampering::tamper_all`] read and write it without external locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    modules: DashMap<PathBuf, StoredModule>,
}

impl MemoryStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `module` under its own path, replacing whatever was there
    pub fn insert(&self, module: Module) {
        self.modules.insert(
            module.path().to_path_buf(),
            StoredModule {
                module,
                signing_key: None,
            },
        );
    }

    /// Returns true if a module is stored at `path`
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    /// Removes and returns the module at `path`
    pub fn remove(&self, path: &Path) -> Option<Module> {
        self.modules.remove(path).map(|(_, stored)| stored.module)
    }

    /// The key the module at `path` was signed with when written
    #[must_use]
    pub fn signing_key(&self, path: &Path) -> Option<PathBuf> {
        self.modules
            .get(path)
            .and_then(|stored| stored.signing_key.clone())
    }

    /// Number of stored modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleReader for MemoryStore {
    fn read(&self, path: &Path) -> Result<Module> {
        self.modules
            .get(path)
            .map(|stored| stored.module.clone())
            .ok_or_else(|| {
                Error::FileError(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("No module at {}", path.display()),
                ))
            })
    }
}

impl ModuleWriter for MemoryStore {
    fn write(
        &self,
        module: &Module,
        destination: &Path,
        signing_key: Option<&Path>,
    ) -> Result<()> {
        // A module that fails to parse must leave nothing behind
        module.types()?;

        let mut module = module.clone();
        module.set_path(destination);
        self.modules.insert(
            destination.to_path_buf(),
            StoredModule {
                module,
                signing_key: signing_key.map(Path::to_path_buf),
            },
        );
        log::debug!("Stored module at {}", destination.display());
        Ok(())
    }
}
