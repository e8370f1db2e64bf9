//! End-to-end processing of (proxy, target) module pairs.
//!
//! [`Tampering`] drives one pair through the whole pipeline:
//!
//! 1. merge the proxy module into the target module, writing the result to the scratch
//!    directory
//! 2. load the merged module
//! 3. validate the original proxy module
//! 4. match proxy types to target types and proxy methods to target methods
//! 5. weave every matched method pair
//! 6. apply the configured version and public key
//!
//! Every step is fatal: the first error aborts the pair, and [`Tampering::tamper_to`] only
//! writes the destination once all steps have succeeded. Independent pairs can be processed
//! in parallel through [`Tampering::tamper_all`].
//!
//! # Examples
//!
//! ```rust
//! use std::{path::Path, sync::Arc};
//! use cilweave::{
//!     file::{MemoryStore, ModuleReader},
//!     metadata::{
//!         identity::Version,
//!         typesystem::{TypeRef, TypeScope},
//!         ModuleBuilder, TypeBuilder,
//!     },
//!     tampering::{ModulePair, TamperingOptions},
//!     Tampering,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert(
//!     ModuleBuilder::new("Library")
//!         .add_type(TypeBuilder::new("Demo.Greeter").public())
//!         .build()?,
//! );
//! store.insert(
//!     ModuleBuilder::new("Proxies")
//!         .add_type(TypeBuilder::new("Demo.GreeterProxy").public().static_class()
//!             .proxy_of(TypeRef::class("Demo.Greeter").with_scope(TypeScope::External("Library".into()))))
//!         .build()?,
//! );
//!
//! let tampering = Tampering::in_memory(store.clone())
//!     .with_options(TamperingOptions::new().result_version(Version::new(9, 0, 0, 0)));
//! tampering.tamper_to(&ModulePair::new("Proxies.dll", "Library.dll"), Path::new("out/Library.dll"))?;
//!
//! assert_eq!(store.read(Path::new("out/Library.dll"))?.version(), Version::new(9, 0, 0, 0));
//! # Ok::<(), cilweave::Error>(())
//! ```

use std::{
    collections::hash_map::DefaultHasher,
    env,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use rayon::prelude::*;

use crate::{
    file::{MemoryStore, MergeRequest, MergeService, ModuleReader, ModuleWriter, UnionMerge},
    matching::{browse, TypeMatch},
    metadata::{identity::Version, Module},
    validation::{ValidationConfig, ValidationEngine},
    weaving::Weaver,
    Error, Result,
};

/// Name of the directory created below the system temporary directory for merged modules
pub const SCRATCH_DIRECTORY: &str = "cilweave";

/// Where the public key of the woven module comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublicKeyModel {
    /// Copy the key of the target module
    #[default]
    Target,
    /// Keep whatever key the merge produced
    None,
    /// Copy the key of the module stored at this path
    Path(PathBuf),
}

/// Configuration of a [`Tampering`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct TamperingOptions {
    /// Version stamped onto the woven module; the merged version is kept when `None`
    pub result_version: Option<Version>,
    /// Source of the woven module's public key
    pub public_key_model: PublicKeyModel,
    /// Key the merged and the woven module are signed with
    pub signing_key: Option<PathBuf>,
    /// Directories searched for referenced modules during the merge, in addition to the
    /// directories holding the proxy and the target
    pub search_directories: Vec<PathBuf>,
    /// Where merged modules are written before weaving
    pub scratch_directory: PathBuf,
    /// Which checks run over the proxy module
    pub validation: ValidationConfig,
}

impl Default for TamperingOptions {
    fn default() -> Self {
        TamperingOptions {
            result_version: None,
            public_key_model: PublicKeyModel::Target,
            signing_key: None,
            search_directories: Vec::new(),
            scratch_directory: env::temp_dir().join(SCRATCH_DIRECTORY),
            validation: ValidationConfig::default(),
        }
    }
}

impl TamperingOptions {
    /// The default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `version` onto every woven module
    #[must_use]
    pub fn result_version(mut self, version: Version) -> Self {
        self.result_version = Some(version);
        self
    }

    /// Sets the source of the woven module's public key
    #[must_use]
    pub fn public_key_model(mut self, model: PublicKeyModel) -> Self {
        self.public_key_model = model;
        self
    }

    /// Signs merged and woven modules with the key at `path`
    #[must_use]
    pub fn signing_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.signing_key = Some(path.into());
        self
    }

    /// Adds a directory searched for referenced modules
    #[must_use]
    pub fn with_search_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_directories.push(path.into());
        self
    }

    /// Sets where merged modules are written
    #[must_use]
    pub fn scratch_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.scratch_directory = path.into();
        self
    }

    /// Sets which checks run over the proxy module
    #[must_use]
    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = config;
        self
    }
}

/// A proxy module and the target module it substitutes routines of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePair {
    /// Path of the proxy module
    pub proxy: PathBuf,
    /// Path of the target module
    pub target: PathBuf,
}

impl ModulePair {
    /// Pairs `proxy` with `target`
    pub fn new(proxy: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        ModulePair {
            proxy: proxy.into(),
            target: target.into(),
        }
    }
}

/// Merges, matches and weaves (proxy, target) module pairs.
pub struct Tampering {
    reader: Arc<dyn ModuleReader>,
    writer: Arc<dyn ModuleWriter>,
    merge: Arc<dyn MergeService>,
    validation: ValidationEngine,
    options: TamperingOptions,
}

impl Tampering {
    /// Creates the pipeline over the given collaborators with default options
    pub fn new(
        reader: Arc<dyn ModuleReader>,
        writer: Arc<dyn ModuleWriter>,
        merge: Arc<dyn MergeService>,
    ) -> Self {
        Tampering {
            reader,
            writer,
            merge,
            validation: ValidationEngine::new(),
            options: TamperingOptions::default(),
        }
    }

    /// Creates the pipeline over a [`MemoryStore`], merged by [`UnionMerge`]
    #[must_use]
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        let merge = Arc::new(UnionMerge::new(store.clone()));
        Self::new(store.clone(), store, merge)
    }

    /// Replaces the options
    #[must_use]
    pub fn with_options(mut self, options: TamperingOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the validation engine
    #[must_use]
    pub fn with_validation_engine(mut self, engine: ValidationEngine) -> Self {
        self.validation = engine;
        self
    }

    /// The options in effect
    #[must_use]
    pub fn options(&self) -> &TamperingOptions {
        &self.options
    }

    /// Runs the pipeline for `pair` and returns the woven module without saving it.
    ///
    /// # Errors
    ///
    /// Propagates read, merge, validation, matching and weaving failures unmodified.
    pub fn tamper(&self, pair: &ModulePair) -> Result<Module> {
        log::info!(
            "Tampering {} with {}",
            pair.target.display(),
            pair.proxy.display()
        );

        let output = self.scratch_path(pair)?;
        let request = MergeRequest::new(&pair.target, &pair.proxy, &output)
            .search_directories(self.search_directories(pair))
            .signing_key(self.options.signing_key.clone());
        let started = Instant::now();
        self.merge.merge(&request)?;
        let mut merged = self.reader.read(&output)?;
        log::debug!(
            "Merged into {} in {:?}",
            output.display(),
            started.elapsed()
        );

        let proxy = self.reader.read(&pair.proxy)?;
        self.validation.run(&proxy, &self.options.validation)?;

        let started = Instant::now();
        let matches = browse(&merged)?;
        let woven = weave(&mut merged, &matches)?;
        log::info!(
            "Wove {} method(s) of {} type(s) into {}",
            woven,
            matches.len(),
            merged.name()
        );
        log::debug!("Matched and wove {} in {:?}", merged.name(), started.elapsed());

        if let Some(version) = self.options.result_version {
            merged.set_version(version);
        }
        match &self.options.public_key_model {
            PublicKeyModel::Target => {
                let target = self.reader.read(&pair.target)?;
                merged.replace_public_key(&target)?;
            }
            PublicKeyModel::Path(path) => {
                let model = self.reader.read(path)?;
                merged.replace_public_key(&model)?;
            }
            PublicKeyModel::None => {}
        }

        Ok(merged)
    }

    /// Runs the pipeline for `pair` and saves the woven module to `destination`.
    ///
    /// Nothing is written unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Everything [`Tampering::tamper`] reports, plus write failures.
    pub fn tamper_to(&self, pair: &ModulePair, destination: &Path) -> Result<()> {
        let woven = self.tamper(pair)?;
        self.writer
            .write(&woven, destination, self.options.signing_key.as_deref())?;
        log::info!("Saved {}", destination.display());
        Ok(())
    }

    /// Processes independent pairs in parallel, each saved to its own destination.
    ///
    /// Results come back in the order of `jobs`; one failing pair does not affect the
    /// others.
    pub fn tamper_all(&self, jobs: &[(ModulePair, PathBuf)]) -> Vec<Result<()>> {
        jobs.par_iter()
            .map(|(pair, destination)| self.tamper_to(pair, destination))
            .collect()
    }

    /// Where the merged module of `pair` is written.
    ///
    /// The directory is `<proxy stem>-<digest>` below the scratch directory, where the digest
    /// covers the full proxy and target paths, so pairs with equal file names in different
    /// directories never share a merged module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if the proxy has no file stem or the target no file name.
    pub fn scratch_path(&self, pair: &ModulePair) -> Result<PathBuf> {
        let (Some(stem), Some(file_name)) = (pair.proxy.file_stem(), pair.target.file_name())
        else {
            return Err(Error::Error(format!(
                "Cannot derive a scratch path for {} and {}",
                pair.proxy.display(),
                pair.target.display()
            )));
        };

        let mut hasher = DefaultHasher::new();
        pair.hash(&mut hasher);
        let directory = format!("{}-{:016x}", stem.to_string_lossy(), hasher.finish());
        Ok(self.options.scratch_directory.join(directory).join(file_name))
    }

    fn search_directories(&self, pair: &ModulePair) -> Vec<PathBuf> {
        let parents = [&pair.proxy, &pair.target]
            .into_iter()
            .filter_map(|path| path.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf);

        let mut directories: Vec<PathBuf> = Vec::new();
        for directory in self.options.search_directories.iter().cloned().chain(parents) {
            if !directories.contains(&directory) {
                directories.push(directory);
            }
        }
        directories
    }
}

/// Weaves every matched method pair of `matches` into `module`; returns the number of woven
/// methods.
fn weave(module: &mut Module, matches: &[TypeMatch]) -> Result<usize> {
    let mut woven = 0;
    for type_match in matches {
        let weaver = Weaver::new(module.type_by_token(type_match.types.proxy)?)?;

        for pair in &type_match.methods {
            let proxy = module.method(pair.proxy)?.clone();
            let destination = module.method_mut(pair.target)?;
            weaver.weave(destination, &proxy)?;
            log::info!(
                "Replaced the body of {} with {}",
                destination.qualified_name(),
                proxy.qualified_name()
            );
            woven += 1;
        }
    }
    Ok(woven)
}
