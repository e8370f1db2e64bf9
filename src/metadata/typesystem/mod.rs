//! Type identities as seen by signatures, locals and instruction operands.
//!
//! The engine never needs a full type system: matching compares types by full name, and
//! weaving only needs to know whether a type is a value type (to decide on boxing) and,
//! for arrays, what the element type is. [`TypeRef`] captures exactly that, plus the
//! resolution scope, which tells whether the type is defined by the module that refers to
//! it or by some other assembly.

use std::fmt;

/// Full name of `System.Void`
pub const SYSTEM_VOID: &str = "System.Void";
/// Full name of `System.String`
pub const SYSTEM_STRING: &str = "System.String";
/// Full name of `System.Object`
pub const SYSTEM_OBJECT: &str = "System.Object";
/// Full name of `System.Int32`
pub const SYSTEM_INT32: &str = "System.Int32";
/// Full name of `System.Int64`
pub const SYSTEM_INT64: &str = "System.Int64";
/// Full name of `System.Boolean`
pub const SYSTEM_BOOLEAN: &str = "System.Boolean";
/// Full name of `System.Double`
pub const SYSTEM_DOUBLE: &str = "System.Double";
/// Name of the core library that defines the `System` primitives
pub const CORE_LIBRARY: &str = "mscorlib";

/// Where a referenced type is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeScope {
    /// Defined by the module that holds the reference
    Local,
    /// Defined by another assembly, identified by its simple name
    External(String),
}

/// Identity of a type as referenced from a signature, a local slot, or an operand.
///
/// # Examples
///
/// ```rust
/// use cilweave::metadata::typesystem::TypeRef;
///
/// let args = TypeRef::array(TypeRef::object());
/// assert_eq!(args.full_name(), "System.Object[]");
/// assert_eq!(args.element().map(TypeRef::full_name), Some("System.Object"));
/// assert!(TypeRef::int32().is_value_type());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    full_name: String,
    value_type: bool,
    scope: TypeScope,
    element: Option<Box<TypeRef>>,
}

impl TypeRef {
    /// A reference type defined by the referring module
    #[must_use]
    pub fn class(full_name: &str) -> Self {
        TypeRef {
            full_name: full_name.to_string(),
            value_type: false,
            scope: TypeScope::Local,
            element: None,
        }
    }

    /// A value type defined by the referring module
    #[must_use]
    pub fn value_type(full_name: &str) -> Self {
        TypeRef {
            value_type: true,
            ..Self::class(full_name)
        }
    }

    /// A single-dimensional, zero-based array of `element`
    #[must_use]
    pub fn array(element: TypeRef) -> Self {
        TypeRef {
            full_name: format!("{}[]", element.full_name),
            value_type: false,
            scope: element.scope.clone(),
            element: Some(Box::new(element)),
        }
    }

    fn core(full_name: &str, value_type: bool) -> Self {
        TypeRef {
            full_name: full_name.to_string(),
            value_type,
            scope: TypeScope::External(CORE_LIBRARY.to_string()),
            element: None,
        }
    }

    /// `System.Void`
    #[must_use]
    pub fn void() -> Self {
        Self::core(SYSTEM_VOID, true)
    }

    /// `System.String`
    #[must_use]
    pub fn string() -> Self {
        Self::core(SYSTEM_STRING, false)
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::core(SYSTEM_OBJECT, false)
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32() -> Self {
        Self::core(SYSTEM_INT32, true)
    }

    /// `System.Int64`
    #[must_use]
    pub fn int64() -> Self {
        Self::core(SYSTEM_INT64, true)
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean() -> Self {
        Self::core(SYSTEM_BOOLEAN, true)
    }

    /// `System.Double`
    #[must_use]
    pub fn double() -> Self {
        Self::core(SYSTEM_DOUBLE, true)
    }

    /// Returns a copy of this reference with a different resolution scope
    #[must_use]
    pub fn with_scope(mut self, scope: TypeScope) -> Self {
        if let Some(element) = self.element.take() {
            self.element = Some(Box::new(element.with_scope(scope.clone())));
        }
        self.scope = scope;
        self
    }

    /// Namespace-qualified name, e.g. `System.String`
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name without namespace
    #[must_use]
    pub fn name(&self) -> &str {
        match self.full_name.rfind('.') {
            Some(pos) => &self.full_name[pos + 1..],
            None => &self.full_name,
        }
    }

    /// Returns true for value types, which have to be boxed to travel as `System.Object`
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.value_type && !self.is_void()
    }

    /// Returns true for `System.Void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.full_name == SYSTEM_VOID
    }

    /// Returns true for `System.String`
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.full_name == SYSTEM_STRING
    }

    /// Returns true for single-dimensional arrays
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.element.is_some()
    }

    /// The element type, if this is an array
    #[must_use]
    pub fn element(&self) -> Option<&TypeRef> {
        self.element.as_deref()
    }

    /// The resolution scope
    #[must_use]
    pub fn scope(&self) -> &TypeScope {
        &self.scope
    }

    /// Rewrites an external scope naming one of `assemblies` into [`TypeScope::Local`].
    ///
    /// Used when two modules are merged: references from one input into the other become
    /// references into the merged module itself.
    pub fn localize(&mut self, assemblies: &[&str]) {
        if let TypeScope::External(name) = &self.scope {
            if assemblies.contains(&name.as_str()) {
                self.scope = TypeScope::Local;
            }
        }
        if let Some(element) = self.element.as_mut() {
            element.localize(assemblies);
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
