//! Generic parameters and their constraint signatures.

use bitflags::bitflags;

use crate::metadata::typesystem::TypeRef;

/// Token standing for the default-constructor constraint in a constraint signature
pub const DEFAULT_CONSTRUCTOR_TOKEN: &str = "new()";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Generic parameter attributes
    pub struct GenericParamAttributes: u16 {
        /// Covariant
        const COVARIANT = 0x0001;
        /// Contravariant
        const CONTRAVARIANT = 0x0002;
        /// The type argument must be a reference type
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// The type argument must be a non-nullable value type
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// The type argument must have a public parameterless constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

/// A generic parameter of a type or method.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    /// Parameter name, e.g. `T`
    pub name: String,
    /// Special constraints and variance
    pub flags: GenericParamAttributes,
    /// Type constraints
    pub constraints: Vec<TypeRef>,
}

impl GenericParam {
    /// An unconstrained generic parameter
    #[must_use]
    pub fn new(name: &str) -> Self {
        GenericParam {
            name: name.to_string(),
            flags: GenericParamAttributes::empty(),
            constraints: Vec::new(),
        }
    }

    /// Adds a type constraint
    #[must_use]
    pub fn constraint(mut self, ty: TypeRef) -> Self {
        self.constraints.push(ty);
        self
    }

    /// Requires a default constructor
    #[must_use]
    pub fn default_constructor(mut self) -> Self {
        self.flags |= GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT;
        self
    }

    /// The constraint set, serialized as a comma-joined, lexicographically sorted list of
    /// constraint full names, with [`DEFAULT_CONSTRUCTOR_TOKEN`] standing for the
    /// default-constructor requirement.
    ///
    /// The parameter's own name is not part of the signature.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilweave::metadata::{generics::GenericParam, typesystem::TypeRef};
    ///
    /// let param = GenericParam::new("T")
    ///     .constraint(TypeRef::class("System.IDisposable"))
    ///     .constraint(TypeRef::class("System.ICloneable"))
    ///     .default_constructor();
    /// assert_eq!(param.signature(), "System.ICloneable,System.IDisposable,new()");
    /// ```
    #[must_use]
    pub fn signature(&self) -> String {
        let mut parts: Vec<&str> = self
            .constraints
            .iter()
            .map(TypeRef::full_name)
            .collect();
        if self
            .flags
            .contains(GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT)
        {
            parts.push(DEFAULT_CONSTRUCTOR_TOKEN);
        }
        parts.sort_unstable();
        parts.join(",")
    }
}

/// The ordered per-parameter constraint signatures of a generic parameter list
#[must_use]
pub fn generic_signature(params: &[GenericParam]) -> Vec<String> {
    params.iter().map(GenericParam::signature).collect()
}
