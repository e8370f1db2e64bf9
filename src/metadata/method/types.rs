//! Method and parameter flags, and the parameter representation.
//!
//! # Key Types
//! - [`MethodAccessFlags`], [`MethodModifiers`]: Method attribute flags
//! - [`ParamAttributes`]: Parameter attribute flags
//! - [`ParameterVariant`]: How an argument is passed
//! - [`Parameter`]: A declared parameter of a method

use std::fmt;

use bitflags::bitflags;

use crate::metadata::typesystem::TypeRef;

/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method access flags
    pub struct MethodAccessFlags: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract access flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let access = flags & METHOD_ACCESS_MASK;
        Self::from_bits_truncate(access)
    }

    /// Access values are an enumeration, not a set; compare the whole value
    #[must_use]
    pub fn is_public(self) -> bool {
        self == MethodAccessFlags::PUBLIC
    }

    /// Keyword used when naming the access level in messages
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self.bits() {
            0x0001 => "private",
            0x0002 => "private protected",
            0x0003 => "internal",
            0x0004 => "protected",
            0x0005 => "protected internal",
            0x0006 => "public",
            _ => "compiler-controlled",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Parameter attributes
    pub struct ParamAttributes: u32 {
        /// Parameter is [In]
        const IN = 0x0001;
        /// Parameter is [Out]
        const OUT = 0x0002;
        /// Parameter is optional
        const OPTIONAL = 0x0010;
        /// Parameter has a default value
        const HAS_DEFAULT = 0x1000;
        /// Parameter has marshalling information
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

impl ParamAttributes {
    /// The flags that count as "extra markers" on a parameter
    pub const MARKERS: ParamAttributes = ParamAttributes::OPTIONAL
        .union(ParamAttributes::HAS_DEFAULT)
        .union(ParamAttributes::HAS_FIELD_MARSHAL);
}

/// How an argument is passed to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterVariant {
    /// By value
    In,
    /// By reference, not initialized by the caller (`out`)
    Out,
    /// By reference, initialized by the caller (`ref`)
    Ref,
    /// Variadic tail (`params`)
    Params,
}

impl ParameterVariant {
    /// Derives the variant from the raw parameter shape.
    ///
    /// A by-reference parameter is `Out` when only the `OUT` flag is set and `Ref` otherwise;
    /// a by-value parameter carrying the `ParamArray` marker is `Params`.
    #[must_use]
    pub fn classify(flags: ParamAttributes, by_ref: bool, param_array: bool) -> Self {
        if by_ref {
            if flags.contains(ParamAttributes::OUT) && !flags.contains(ParamAttributes::IN) {
                ParameterVariant::Out
            } else {
                ParameterVariant::Ref
            }
        } else if param_array {
            ParameterVariant::Params
        } else {
            ParameterVariant::In
        }
    }

    /// Returns true for `Out` and `Ref`, whose argument slots hold an address
    #[must_use]
    pub fn is_by_ref(self) -> bool {
        matches!(self, ParameterVariant::Out | ParameterVariant::Ref)
    }
}

impl fmt::Display for ParameterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterVariant::In => "in",
            ParameterVariant::Out => "out",
            ParameterVariant::Ref => "ref",
            ParameterVariant::Params => "params",
        })
    }
}

/// A declared parameter of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type; for by-reference variants, the type being referenced
    pub ty: TypeRef,
    /// Passing variant
    pub variant: ParameterVariant,
    /// Raw attribute flags
    pub flags: ParamAttributes,
}

impl Parameter {
    /// A by-value parameter
    #[must_use]
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Parameter {
            name: name.to_string(),
            ty,
            variant: ParameterVariant::In,
            flags: ParamAttributes::empty(),
        }
    }

    /// Changes the passing variant
    #[must_use]
    pub fn variant(mut self, variant: ParameterVariant) -> Self {
        self.variant = variant;
        if variant == ParameterVariant::Out {
            self.flags |= ParamAttributes::OUT;
        }
        self
    }

    /// Adds attribute flags
    #[must_use]
    pub fn flags(mut self, flags: ParamAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns true if the parameter carries a default value, optional or marshalling marker
    #[must_use]
    pub fn has_markers(&self) -> bool {
        self.flags.intersects(ParamAttributes::MARKERS)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            ParameterVariant::In => write!(f, "{} {}", self.ty, self.name),
            variant => write!(f, "{variant} {} {}", self.ty, self.name),
        }
    }
}
