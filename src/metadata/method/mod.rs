//! Method definitions and method references.
//!
//! # Key Components
//!
//! - [`MethodDef`] - A method defined by a module, with its signature, tags and body
//! - [`MethodRef`] - A call target as seen from an instruction operand
//! - [`MethodBody`] - Instructions, local slots and exception handlers
//! - [`Parameter`] / [`ParameterVariant`] - Declared parameters
//!
//! # Argument Slots
//!
//! Declared parameters occupy argument slots in order starting at 0. A true instance
//! method reserves slot 0 for its receiver, which moves the declared parameters to start at
//! slot 1. [`MethodDef::argument_slot`] performs that mapping.

mod body;
mod exceptions;
mod types;

pub use body::*;
pub use exceptions::*;
pub use types::*;

use std::fmt;

use crate::{
    metadata::{
        customattributes::{CustomAttribute, Tag, TagKind, TargetMethodType},
        generics::{generic_signature, GenericParam},
        token::Token,
        typesystem::TypeRef,
    },
    Result,
};

/// Name of instance constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Which methods (or types) an enumeration should yield, by static-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Only static members
    Static,
    /// Only instance members
    Instance,
    /// Both
    Any,
}

impl MemberKind {
    /// Returns true if a member with the given static-ness passes this filter
    #[must_use]
    pub fn accepts(self, is_static: bool) -> bool {
        match self {
            MemberKind::Static => is_static,
            MemberKind::Instance => !is_static,
            MemberKind::Any => true,
        }
    }
}

impl From<TargetMethodType> for MemberKind {
    fn from(kind: TargetMethodType) -> Self {
        match kind {
            TargetMethodType::Instance => MemberKind::Instance,
            TargetMethodType::Static => MemberKind::Static,
            TargetMethodType::Any => MemberKind::Any,
        }
    }
}

/// A reference to a method, as carried by `call`, `callvirt` and `newobj` operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The type declaring the method
    pub declaring_type: TypeRef,
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: TypeRef,
    /// Declared parameter types, in order
    pub parameters: Vec<TypeRef>,
    /// The method takes an implicit receiver in slot 0
    pub has_this: bool,
}

impl MethodRef {
    /// A reference to a static method
    #[must_use]
    pub fn new_static(
        declaring_type: TypeRef,
        name: &str,
        return_type: TypeRef,
        parameters: Vec<TypeRef>,
    ) -> Self {
        MethodRef {
            declaring_type,
            name: name.to_string(),
            return_type,
            parameters,
            has_this: false,
        }
    }

    /// A reference to an instance method
    #[must_use]
    pub fn new_instance(
        declaring_type: TypeRef,
        name: &str,
        return_type: TypeRef,
        parameters: Vec<TypeRef>,
    ) -> Self {
        MethodRef {
            has_this: true,
            ..Self::new_static(declaring_type, name, return_type, parameters)
        }
    }

    /// `Namespace.Type::Name`
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type.full_name(), self.name)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.parameters.iter().map(TypeRef::full_name).collect();
        write!(
            f,
            "{}{} {}({})",
            if self.has_this { "instance " } else { "" },
            self.return_type,
            self.qualified_name(),
            params.join(", ")
        )
    }
}

/// A method defined by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Token of this method
    pub token: Token,
    /// Short name
    pub name: String,
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Access flags
    pub flags_access: MethodAccessFlags,
    /// Modifiers
    pub flags_modifiers: MethodModifiers,
    /// Return type
    pub return_type: TypeRef,
    /// Declared parameters, in order
    pub params: Vec<Parameter>,
    /// Generic parameters, in order
    pub generic_params: Vec<GenericParam>,
    /// Raw custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Tags decoded from `custom_attributes` (and the owning property's) at load time
    pub tags: Vec<Tag>,
    /// The body
    pub body: MethodBody,
}

impl MethodDef {
    /// Returns true for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true for public methods
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags_access.is_public()
    }

    /// Returns true for true instance methods, whose slot 0 holds the receiver
    #[must_use]
    pub fn has_this(&self) -> bool {
        !self.is_static()
    }

    /// Returns true for instance constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Returns true for generic methods
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns true if the method returns nothing
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// `Namespace.Type::Name`, used to name the method in messages
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }

    /// The name used for matching: the override name from a proxy-method tag if declared,
    /// else the short name
    #[must_use]
    pub fn effective_name(&self) -> &str {
        self.tags
            .iter()
            .find_map(|tag| match tag {
                Tag::ProxyMethod {
                    name: Some(name), ..
                } => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or(&self.name)
    }

    /// Which target methods this proxy method may replace; `None` if it is not a proxy method
    #[must_use]
    pub fn proxy_target_kind(&self) -> Option<TargetMethodType> {
        self.tags.iter().find_map(|tag| match tag {
            Tag::ProxyMethod { kind, .. } => Some(*kind),
            _ => None,
        })
    }

    /// Returns true if the method carries a tag of the given kind
    #[must_use]
    pub fn has_tag(&self, kind: TagKind) -> bool {
        self.tags.iter().any(|tag| tag.kind() == kind)
    }

    /// Returns true if the method carries every tag in `kinds`; extra tags are ignored
    #[must_use]
    pub fn has_tags(&self, kinds: &[TagKind]) -> bool {
        kinds.iter().all(|kind| self.has_tag(*kind))
    }

    /// The ordered per-parameter generic constraint signatures
    #[must_use]
    pub fn generic_signature(&self) -> Vec<String> {
        generic_signature(&self.generic_params)
    }

    /// The argument slot holding declared parameter `index`
    pub fn argument_slot(&self, index: usize) -> Result<u16> {
        let slot = if self.has_this() { index + 1 } else { index };
        u16::try_from(slot).map_err(|_| {
            malformed_error!(
                "{} has too many parameters - {}",
                self.qualified_name(),
                self.params.len()
            )
        })
    }

    /// A reference suitable for a `call` operand targeting this method
    #[must_use]
    pub fn reference(&self) -> MethodRef {
        MethodRef {
            declaring_type: TypeRef::class(&self.declaring_type),
            name: self.name.clone(),
            return_type: self.return_type.clone(),
            parameters: self.params.iter().map(|param| param.ty.clone()).collect(),
            has_this: self.has_this(),
        }
    }
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{}{} {}",
            if self.is_static() { "static " } else { "" },
            self.return_type,
            self.qualified_name()
        )?;
        if self.is_generic() {
            let names: Vec<&str> = self.generic_params.iter().map(|g| g.name.as_str()).collect();
            write!(f, "<{}>", names.join(", "))?;
        }
        write!(f, "({})", params.join(", "))
    }
}
