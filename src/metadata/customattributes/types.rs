//! CustomAttribute-specific types and data structures.
//!
//! This module contains the raw form of a custom attribute as attached to a type, method
//! or property, before it is decoded into a [`crate::metadata::customattributes::Tag`].

use crate::metadata::typesystem::TypeRef;

/// Full name of the attribute marking a type as a stand-in for another type
pub const PROXY_OF_ATTRIBUTE: &str = "Cilweave.Attributes.ProxyOfAttribute";
/// Full name of the attribute marking a method as a stand-in for another method
pub const PROXY_METHOD_ATTRIBUTE: &str = "Cilweave.Attributes.ProxyMethodAttribute";
/// Full name of the attribute marking the method to run before every woven call
pub const ENTRY_HOOK_ATTRIBUTE: &str = "Cilweave.Attributes.EntryHookAttribute";
/// Full name of the attribute marking the method to run before every woven return
pub const EXIT_HOOK_ATTRIBUTE: &str = "Cilweave.Attributes.ExitHookAttribute";
/// Full name of the enum selecting which kind of target method a proxy method replaces
pub const TARGET_METHOD_TYPE: &str = "Cilweave.Attributes.TargetMethodType";

/// Represents a custom attribute attached to a type, method or property
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// Full name of the attribute type
    pub type_name: String,
    /// Fixed arguments from the constructor signature
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Named arguments (fields and properties)
    pub named_args: Vec<CustomAttributeNamedArgument>,
}

impl CustomAttribute {
    /// An attribute without arguments
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        CustomAttribute {
            type_name: type_name.to_string(),
            fixed_args: Vec::new(),
            named_args: Vec::new(),
        }
    }

    /// Appends a fixed (constructor) argument
    #[must_use]
    pub fn arg(mut self, value: CustomAttributeArgument) -> Self {
        self.fixed_args.push(value);
        self
    }

    /// Appends a named property argument
    #[must_use]
    pub fn named(mut self, name: &str, value: CustomAttributeArgument) -> Self {
        self.named_args.push(CustomAttributeNamedArgument {
            is_field: false,
            name: name.to_string(),
            value,
        });
        self
    }
}

/// Represents a single custom attribute argument value
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {
    /// Boolean value
    Bool(bool),
    /// Signed 32-bit integer
    I4(i32),
    /// Signed 64-bit integer
    I8(i64),
    /// 64-bit floating point
    R8(f64),
    /// UTF-8 string
    String(String),
    /// Type reference, as written in the referring module
    Type(TypeRef),
    /// Array of arguments
    Array(Vec<CustomAttributeArgument>),
    /// Enum value (enum type full name + underlying value)
    Enum(String, i32),
}

/// Represents a named argument (field or property) in a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Whether this is a field (true) or property (false)
    pub is_field: bool,
    /// Name of the field or property
    pub name: String,
    /// Value of the argument
    pub value: CustomAttributeArgument,
}
