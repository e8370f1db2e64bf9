//! Metadata model of modules, types and methods.
//!
//! This is the in-memory representation the rest of the crate operates on. It is
//! deliberately reduced: a module is a set of types, a type is a set of methods and
//! properties, and a method is a signature plus a body of [`crate::assembly::Instruction`]s.
//! How the model is read from or written to a binary format is the concern of the
//! [`crate::file`] traits.
//!
//! # Key Components
//!
//! - [`Module`] - Lazily loaded module with version and public key
//! - [`TypeDef`] / [`MethodDef`] - Definitions carrying raw attributes and decoded tags
//! - [`customattributes`] - The declarative tags that drive matching and weaving
//! - [`typesystem`] - Type identities ([`typesystem::TypeRef`])
//! - [`method`] - Parameters, bodies, exception handlers
//! - [`token`] - Stable handles to types and methods
//! - [`ModuleBuilder`] and friends - Fluent construction of in-memory modules
//!
//! # Examples
//!
//! ```rust
//! use cilweave::metadata::{
//!     customattributes::TagKind, method::MemberKind, typesystem::TypeRef, MethodBuilder,
//!     ModuleBuilder, TypeBuilder,
//! };
//!
//! let module = ModuleBuilder::new("Proxies")
//!     .add_type(
//!         TypeBuilder::new("Demo.GreeterProxy")
//!             .public()
//!             .static_class()
//!             .proxy_of(TypeRef::class("Demo.Greeter")),
//!     )
//!     .build()?;
//!
//! let proxies: Vec<_> = module.find_types(MemberKind::Static, &[TagKind::ProxyOf])?.collect();
//! assert_eq!(proxies.len(), 1);
//! # Ok::<(), cilweave::Error>(())
//! ```

mod builders;
/// Declarative tags and the raw custom attributes they are decoded from
pub mod customattributes;
/// Generic parameters and constraint signatures
pub mod generics;
/// Versions and public keys
pub mod identity;
/// Method definitions, parameters and bodies
pub mod method;
mod module;
/// Metadata tokens
pub mod token;
mod typedef;
/// Type identities
pub mod typesystem;

pub use builders::{
    MethodBodyBuilder, MethodBuilder, ModuleBuilder, PropertyBuilder, TypeBuilder,
};
pub use method::{MemberKind, MethodDef, MethodRef};
pub use module::{AssemblyInfo, AssemblyName, Module, TypeSource};
pub use typedef::{PropertyDef, TypeAttributes, TypeDef, MODULE_PLACEHOLDER};

pub(crate) use typedef::assign_tokens;
