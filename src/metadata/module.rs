//! The loaded module: the unit that is merged, matched, woven and saved.
//!
//! A [`Module`] is cheap to create. Its types are parsed from a [`TypeSource`] the first
//! time a structural query needs them and cached in a [`OnceLock`]; afterwards the module
//! is immutable except for its version, its public key, and the method bodies the weaver
//! rewrites through [`Module::method_mut`].
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use cilweave::metadata::{Module, TypeBuilder};
//!
//! let source = || -> cilweave::Result<Vec<cilweave::metadata::TypeDef>> {
//!     Ok(vec![TypeBuilder::new("Demo.Greeter").public().build()?])
//! };
//! let module = Module::lazy("Library", "Library.dll", Arc::new(source));
//! assert!(!module.is_loaded());
//!
//! assert_eq!(module.find_type("Demo.Greeter")?.name, "Greeter");
//! assert!(module.is_loaded());
//! # Ok::<(), cilweave::Error>(())
//! ```

use std::{
    any::Any,
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use crate::{
    metadata::{
        customattributes::{decode_tags, TagKind},
        identity::{PublicKey, Version},
        method::{MemberKind, MethodDef},
        token::Token,
        typedef::TypeDef,
    },
    Error, Result,
};

/// Produces the types of a module on first use.
pub trait TypeSource: Send + Sync {
    /// Parses the module's type definitions
    ///
    /// # Errors
    ///
    /// Whatever the underlying format reader reports; the error reaches the caller of the
    /// first structural query unmodified.
    fn parse(&self) -> Result<Vec<TypeDef>>;
}

impl<F> TypeSource for F
where
    F: Fn() -> Result<Vec<TypeDef>> + Send + Sync,
{
    fn parse(&self) -> Result<Vec<TypeDef>> {
        self()
    }
}

/// Identity facts of an assembly, whatever its concrete representation.
pub trait AssemblyInfo: Send + Sync {
    /// Simple name
    fn name(&self) -> &str;
    /// Version
    fn version(&self) -> Version;
    /// Strong-name public key, if signed
    fn public_key(&self) -> Option<&PublicKey>;
    /// Downcasting support
    fn as_any(&self) -> &dyn Any;
}

/// Identity of an assembly known only by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyName {
    /// Simple name
    pub name: String,
    /// Version
    pub version: Version,
    /// Public key, if known
    pub public_key: Option<PublicKey>,
}

impl AssemblyInfo for AssemblyName {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Version {
        self.version
    }

    fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A module and its type definitions.
#[derive(Clone)]
pub struct Module {
    name: String,
    path: PathBuf,
    version: Version,
    public_key: Option<PublicKey>,
    source: Option<Arc<dyn TypeSource>>,
    types: OnceLock<Vec<TypeDef>>,
}

impl Module {
    /// A module whose types are parsed from `source` on first use
    pub fn lazy(name: &str, path: impl Into<PathBuf>, source: Arc<dyn TypeSource>) -> Self {
        Module {
            name: name.to_string(),
            path: path.into(),
            version: Version::ZERO,
            public_key: None,
            source: Some(source),
            types: OnceLock::new(),
        }
    }

    /// A module over already materialized types; tags are decoded immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for duplicate type names and propagates tag decoding
    /// failures.
    pub fn from_types(name: &str, path: impl Into<PathBuf>, types: Vec<TypeDef>) -> Result<Self> {
        let module = Module {
            name: name.to_string(),
            path: path.into(),
            version: Version::ZERO,
            public_key: None,
            source: None,
            types: OnceLock::new(),
        };
        let types = module.prepare(types)?;
        // Freshly created, so the cell is empty
        let _ = module.types.set(types);
        Ok(module)
    }

    /// Simple name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file this module was read from or will be written to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Points the module at another file
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Version
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Overwrites the version
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Strong-name public key
    #[must_use]
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Sets or clears the public key
    pub fn set_public_key(&mut self, public_key: Option<PublicKey>) {
        self.public_key = public_key;
    }

    /// Copies the public key of `model`, which must be a loaded [`Module`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] for any other [`AssemblyInfo`] implementation.
    pub fn replace_public_key(&mut self, model: &dyn AssemblyInfo) -> Result<()> {
        let Some(model) = model.as_any().downcast_ref::<Module>() else {
            return Err(Error::NotImplemented(format!(
                "Public key replacement from {} requires a loaded module",
                model.name()
            )));
        };
        self.public_key = model.public_key.clone();
        Ok(())
    }

    /// Returns true once the types have been parsed
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.types.get().is_some()
    }

    fn prepare(&self, mut types: Vec<TypeDef>) -> Result<Vec<TypeDef>> {
        let mut seen = HashSet::new();
        for ty in &types {
            let full_name = ty.full_name();
            if !seen.insert(full_name.clone()) {
                return Err(malformed_error!(
                    "Module {} defines {} more than once",
                    self.name,
                    full_name
                ));
            }
        }
        decode_tags(&self.name, &mut types)?;
        Ok(types)
    }

    fn ensure_loaded(&self) -> Result<&Vec<TypeDef>> {
        if let Some(types) = self.types.get() {
            return Ok(types);
        }

        let Some(source) = &self.source else {
            return Err(Error::Error(format!("Module {} has no type source", self.name)));
        };
        log::debug!("Parsing types of {}", self.name);
        let types = self.prepare(source.parse()?)?;
        Ok(self.types.get_or_init(|| types))
    }

    /// All types, parsing them on first use
    pub fn types(&self) -> Result<&[TypeDef]> {
        self.ensure_loaded().map(Vec::as_slice)
    }

    /// Mutable access to the types, parsing them on first use
    pub fn types_mut(&mut self) -> Result<&mut Vec<TypeDef>> {
        self.ensure_loaded()?;
        let name = &self.name;
        self.types
            .get_mut()
            .ok_or_else(|| Error::Error(format!("Module {name} failed to load")))
    }

    /// Type by full name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] carrying `full_name` if no such type exists.
    pub fn find_type(&self, full_name: &str) -> Result<&TypeDef> {
        self.types()?
            .iter()
            .find(|ty| ty.full_name() == full_name)
            .ok_or_else(|| Error::TypeNotFound(full_name.to_string()))
    }

    /// Types passing the static-ness filter and carrying every tag in `required`
    pub fn find_types<'a>(
        &'a self,
        kind: MemberKind,
        required: &'a [TagKind],
    ) -> Result<impl Iterator<Item = &'a TypeDef> + 'a> {
        Ok(self
            .types()?
            .iter()
            .filter(move |ty| kind.accepts(ty.is_static()) && ty.has_tags(required)))
    }

    /// Type by token
    pub fn type_by_token(&self, token: Token) -> Result<&TypeDef> {
        self.types()?
            .iter()
            .find(|ty| ty.token == token)
            .ok_or_else(|| malformed_error!("Module {} has no type {}", self.name, token))
    }

    /// Method by token, searched across all types
    pub fn method(&self, token: Token) -> Result<&MethodDef> {
        self.types()?
            .iter()
            .find_map(|ty| ty.method(token))
            .ok_or_else(|| malformed_error!("Module {} has no method {}", self.name, token))
    }

    /// Mutable method by token
    pub fn method_mut(&mut self, token: Token) -> Result<&mut MethodDef> {
        let name = self.name.clone();
        self.types_mut()?
            .iter_mut()
            .find_map(|ty| ty.method_mut(token))
            .ok_or_else(|| malformed_error!("Module {} has no method {}", name, token))
    }

    /// The type declaring the method `token`
    pub fn declaring_type(&self, token: Token) -> Result<&TypeDef> {
        self.types()?
            .iter()
            .find(|ty| ty.method(token).is_some())
            .ok_or_else(|| malformed_error!("Module {} has no method {}", self.name, token))
    }
}

impl AssemblyInfo for Module {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Version {
        self.version
    }

    fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("public_key", &self.public_key)
            .field("types", &self.types.get().map(Vec::len))
            .finish()
    }
}
