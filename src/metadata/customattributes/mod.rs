//! Declarative tags driving matching and weaving.
//!
//! Proxy modules describe what they replace with four custom attributes. Instead of looking
//! attributes up by name at every matching step, a module decodes them exactly once, when
//! it is loaded, into strongly typed [`Tag`]s stored next to the raw attributes on each
//! [`crate::metadata::TypeDef`] and [`crate::metadata::MethodDef`].
//!
//! # Tag Roles
//!
//! | Attribute | Tag | Meaning |
//! |-----------|-----|---------|
//! | `ProxyOfAttribute(Type)` | [`Tag::ProxyOf`] | this type stands in for the given type |
//! | `ProxyMethodAttribute([TargetMethodType], [Name])` | [`Tag::ProxyMethod`] | this method stands in for a method |
//! | `EntryHookAttribute` | [`Tag::EntryHook`] | this method runs before every woven call |
//! | `ExitHookAttribute` | [`Tag::ExitHook`] | this method runs before every woven return |
//!
//! Property accessors inherit the tags of their owning property.
//!
//! # Examples
//!
//! ```rust
//! use cilweave::metadata::customattributes::{
//!     CustomAttribute, CustomAttributeArgument, Tag, TagDecoder, TargetMethodType,
//!     PROXY_METHOD_ATTRIBUTE,
//! };
//!
//! let decoder = TagDecoder::new("Proxies", std::iter::empty::<&str>());
//! let attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE)
//!     .named("Name", CustomAttributeArgument::String(".ctor".into()));
//!
//! let tag = decoder.decode(&attribute)?;
//! assert_eq!(
//!     tag,
//!     Some(Tag::ProxyMethod { name: Some(".ctor".into()), kind: TargetMethodType::Any })
//! );
//! # Ok::<(), cilweave::Error>(())
//! ```

mod types;

pub use types::*;

use std::{collections::HashSet, fmt};

use crate::{
    metadata::{
        typesystem::{TypeRef, TypeScope},
        TypeDef,
    },
    Result,
};

/// Which kind of target method a proxy method may replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetMethodType {
    /// Only instance methods (including constructors)
    Instance,
    /// Only static methods
    Static,
    /// Either
    Any,
}

impl TargetMethodType {
    /// Decodes the underlying value of the `TargetMethodType` enum
    pub fn from_value(value: i32) -> Result<Self> {
        match value {
            0 => Ok(TargetMethodType::Instance),
            1 => Ok(TargetMethodType::Static),
            2 => Ok(TargetMethodType::Any),
            _ => Err(malformed_error!("Invalid TargetMethodType value - {}", value)),
        }
    }

    /// The underlying enum value
    #[must_use]
    pub fn value(self) -> i32 {
        match self {
            TargetMethodType::Instance => 0,
            TargetMethodType::Static => 1,
            TargetMethodType::Any => 2,
        }
    }
}

/// The role of a [`Tag`], used to filter elements by the tags they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// [`Tag::ProxyOf`]
    ProxyOf,
    /// [`Tag::ProxyMethod`]
    ProxyMethod,
    /// [`Tag::EntryHook`]
    EntryHook,
    /// [`Tag::ExitHook`]
    ExitHook,
}

/// A decoded declarative tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// The tagged type stands in for `target`
    ProxyOf {
        /// The replaced type; its scope is [`TypeScope::Local`] when it resolved to a type of
        /// the owning module
        target: TypeRef,
    },
    /// The tagged method stands in for a method of the target type
    ProxyMethod {
        /// Name of the replaced method, when it differs from the proxy's own name
        name: Option<String>,
        /// Which target methods are candidates
        kind: TargetMethodType,
    },
    /// The tagged method runs before every woven call
    EntryHook,
    /// The tagged method runs before every woven return
    ExitHook,
}

impl Tag {
    /// The role of this tag
    #[must_use]
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::ProxyOf { .. } => TagKind::ProxyOf,
            Tag::ProxyMethod { .. } => TagKind::ProxyMethod,
            Tag::EntryHook => TagKind::EntryHook,
            Tag::ExitHook => TagKind::ExitHook,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::ProxyOf { target } => write!(f, "[ProxyOf({target})]"),
            Tag::ProxyMethod { name: Some(name), .. } => write!(f, "[ProxyMethod({name})]"),
            Tag::ProxyMethod { name: None, .. } => f.write_str("[ProxyMethod]"),
            Tag::EntryHook => f.write_str("[EntryHook]"),
            Tag::ExitHook => f.write_str("[ExitHook]"),
        }
    }
}

/// A materialized attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// Boolean value
    Bool(bool),
    /// Integer value, widened
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// A type defined by the owning module, with its scope rewritten to local
    LocalType(TypeRef),
    /// A type naming the owning module that the module does not define, kept local so the
    /// lookup failure surfaces where the type is used
    UnresolvedType(TypeRef),
    /// A type defined elsewhere, kept as an opaque reference
    ForeignType(TypeRef),
    /// Enum value
    Enum(String, i32),
    /// Array of values
    Array(Vec<ArgumentValue>),
}

/// Decodes raw custom attributes of one module into [`Tag`]s.
pub struct TagDecoder {
    module: String,
    local_types: HashSet<String>,
}

impl TagDecoder {
    /// Creates a decoder for the module `module` defining the types `local_types`
    pub fn new<I, S>(module: &str, local_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagDecoder {
            module: module.to_string(),
            local_types: local_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Materializes a constructor or named argument.
    ///
    /// A type-valued argument whose scope is local, or names the owning module, is resolved
    /// through the module's own type instead of being treated as a foreign handle. When the
    /// module defines no such type the argument becomes [`ArgumentValue::UnresolvedType`].
    ///
    /// # Errors
    ///
    /// Propagates failures of nested array elements.
    pub fn materialize(&self, argument: &CustomAttributeArgument) -> Result<ArgumentValue> {
        Ok(match argument {
            CustomAttributeArgument::Bool(value) => ArgumentValue::Bool(*value),
            CustomAttributeArgument::I4(value) => ArgumentValue::Integer(i64::from(*value)),
            CustomAttributeArgument::I8(value) => ArgumentValue::Integer(*value),
            CustomAttributeArgument::R8(value) => ArgumentValue::Float(*value),
            CustomAttributeArgument::String(value) => ArgumentValue::String(value.clone()),
            CustomAttributeArgument::Enum(name, value) => ArgumentValue::Enum(name.clone(), *value),
            CustomAttributeArgument::Array(values) => ArgumentValue::Array(
                values
                    .iter()
                    .map(|value| self.materialize(value))
                    .collect::<Result<Vec<_>>>()?,
            ),
            CustomAttributeArgument::Type(ty) => {
                let owned = match ty.scope() {
                    TypeScope::Local => true,
                    TypeScope::External(assembly) => *assembly == self.module,
                };
                if !owned {
                    return Ok(ArgumentValue::ForeignType(ty.clone()));
                }
                let local = ty.clone().with_scope(TypeScope::Local);
                if self.local_types.contains(ty.full_name()) {
                    ArgumentValue::LocalType(local)
                } else {
                    log::debug!("{} is not defined by {}", ty.full_name(), self.module);
                    ArgumentValue::UnresolvedType(local)
                }
            }
        })
    }

    /// Decodes one attribute; attributes without a tag role yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when a tag attribute carries unusable arguments, and
    /// propagates [`TagDecoder::materialize`] failures.
    pub fn decode(&self, attribute: &CustomAttribute) -> Result<Option<Tag>> {
        match attribute.type_name.as_str() {
            PROXY_OF_ATTRIBUTE => {
                let target = attribute
                    .fixed_args
                    .first()
                    .map(|argument| self.materialize(argument))
                    .transpose()?;
                match target {
                    Some(
                        ArgumentValue::LocalType(target)
                        | ArgumentValue::UnresolvedType(target)
                        | ArgumentValue::ForeignType(target),
                    ) => {
                        Ok(Some(Tag::ProxyOf { target }))
                    }
                    Some(ArgumentValue::String(name)) => Ok(Some(Tag::ProxyOf {
                        target: TypeRef::class(&name),
                    })),
                    _ => Err(malformed_error!(
                        "{} requires a type argument",
                        PROXY_OF_ATTRIBUTE
                    )),
                }
            }
            PROXY_METHOD_ATTRIBUTE => {
                let mut name = None;
                let mut kind = TargetMethodType::Any;

                let named = attribute.named_args.iter().map(|arg| (Some(&arg.name), &arg.value));
                let fixed = attribute.fixed_args.iter().map(|arg| (None, arg));
                for (arg_name, argument) in fixed.chain(named) {
                    match (arg_name.map(String::as_str), self.materialize(argument)?) {
                        (None | Some("Name"), ArgumentValue::String(value)) => name = Some(value),
                        (None | Some("MethodType"), ArgumentValue::Enum(_, value)) => {
                            kind = TargetMethodType::from_value(value)?;
                        }
                        (Some("MethodType"), ArgumentValue::Integer(value)) => {
                            kind = TargetMethodType::from_value(
                                i32::try_from(value).unwrap_or(i32::MAX),
                            )?;
                        }
                        (arg_name, value) => {
                            return Err(malformed_error!(
                                "Unexpected argument {:?} = {:?} on {}",
                                arg_name,
                                value,
                                PROXY_METHOD_ATTRIBUTE
                            ))
                        }
                    }
                }

                Ok(Some(Tag::ProxyMethod { name, kind }))
            }
            ENTRY_HOOK_ATTRIBUTE => Ok(Some(Tag::EntryHook)),
            EXIT_HOOK_ATTRIBUTE => Ok(Some(Tag::ExitHook)),
            _ => Ok(None),
        }
    }

    /// Decodes every tag-bearing attribute of a list
    pub fn decode_all(&self, attributes: &[CustomAttribute]) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        for attribute in attributes {
            if let Some(tag) = self.decode(attribute)? {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}

/// Decodes the tags of every type, method and property accessor of a module in place.
///
/// Decoding replaces previously decoded tags, so calling it twice yields the same result.
pub(crate) fn decode_tags(module: &str, types: &mut [TypeDef]) -> Result<()> {
    let decoder = TagDecoder::new(module, types.iter().map(TypeDef::full_name));

    for ty in types.iter_mut() {
        ty.tags = decoder.decode_all(&ty.custom_attributes)?;

        for method in &mut ty.methods {
            method.tags = decoder.decode_all(&method.custom_attributes)?;
        }

        for property in &ty.properties {
            let inherited = decoder.decode_all(&property.custom_attributes)?;
            if inherited.is_empty() {
                continue;
            }

            for accessor in property.accessors() {
                let Some(method) = ty.methods.iter_mut().find(|m| m.token == accessor) else {
                    return Err(malformed_error!(
                        "Property {}::{} refers to missing accessor {}",
                        ty.full_name(),
                        property.name,
                        accessor
                    ));
                };
                for tag in &inherited {
                    if !method.tags.contains(tag) {
                        method.tags.push(tag.clone());
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn decoder() -> TagDecoder {
        TagDecoder::new("Proxies", ["Demo.Greeter", "Demo.GreeterProxy"])
    }

    #[test]
    fn proxy_of_local_type() {
        let attribute = CustomAttribute::new(PROXY_OF_ATTRIBUTE).arg(
            CustomAttributeArgument::Type(
                TypeRef::class("Demo.Greeter").with_scope(TypeScope::External("Proxies".into())),
            ),
        );
        let tag = decoder().decode(&attribute).unwrap().unwrap();
        assert_eq!(
            tag,
            Tag::ProxyOf {
                target: TypeRef::class("Demo.Greeter")
            }
        );
    }

    #[test]
    fn proxy_of_foreign_type() {
        let target =
            TypeRef::class("Demo.Greeter").with_scope(TypeScope::External("Library".into()));
        let attribute = CustomAttribute::new(PROXY_OF_ATTRIBUTE)
            .arg(CustomAttributeArgument::Type(target.clone()));
        let Some(Tag::ProxyOf { target: decoded }) = decoder().decode(&attribute).unwrap() else {
            panic!("expected ProxyOf");
        };
        assert_eq!(decoded, target);
    }

    #[test]
    fn proxy_of_missing_local_type() {
        let missing =
            TypeRef::class("Demo.Missing").with_scope(TypeScope::External("Proxies".into()));
        assert_eq!(
            decoder().materialize(&CustomAttributeArgument::Type(missing.clone())).unwrap(),
            ArgumentValue::UnresolvedType(TypeRef::class("Demo.Missing"))
        );

        let attribute =
            CustomAttribute::new(PROXY_OF_ATTRIBUTE).arg(CustomAttributeArgument::Type(missing));
        assert_eq!(
            decoder().decode(&attribute).unwrap(),
            Some(Tag::ProxyOf {
                target: TypeRef::class("Demo.Missing")
            })
        );
    }

    #[test]
    fn proxy_of_without_argument() {
        let attribute = CustomAttribute::new(PROXY_OF_ATTRIBUTE);
        assert!(matches!(
            decoder().decode(&attribute),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn proxy_method_arguments() {
        let attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE).arg(
            CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.into(), 1),
        );
        assert_eq!(
            decoder().decode(&attribute).unwrap(),
            Some(Tag::ProxyMethod {
                name: None,
                kind: TargetMethodType::Static
            })
        );

        let attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE)
            .arg(CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.into(), 0))
            .arg(CustomAttributeArgument::String("get_Now".into()));
        assert_eq!(
            decoder().decode(&attribute).unwrap(),
            Some(Tag::ProxyMethod {
                name: Some("get_Now".into()),
                kind: TargetMethodType::Instance
            })
        );
    }

    #[test]
    fn proxy_method_rejects_garbage() {
        let attribute =
            CustomAttribute::new(PROXY_METHOD_ATTRIBUTE).arg(CustomAttributeArgument::Bool(true));
        assert!(decoder().decode(&attribute).is_err());

        let attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE)
            .arg(CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.into(), 7));
        assert!(decoder().decode(&attribute).is_err());
    }

    #[test]
    fn unrelated_attributes_are_ignored() {
        let attribute = CustomAttribute::new("System.ObsoleteAttribute")
            .arg(CustomAttributeArgument::String("old".into()));
        assert_eq!(decoder().decode(&attribute).unwrap(), None);
        assert_eq!(
            decoder()
                .decode_all(&[
                    attribute,
                    CustomAttribute::new(ENTRY_HOOK_ATTRIBUTE),
                    CustomAttribute::new(EXIT_HOOK_ATTRIBUTE),
                ])
                .unwrap(),
            vec![Tag::EntryHook, Tag::ExitHook]
        );
    }

    #[test]
    fn target_method_type() {
        for kind in [
            TargetMethodType::Instance,
            TargetMethodType::Static,
            TargetMethodType::Any,
        ] {
            assert_eq!(TargetMethodType::from_value(kind.value()).unwrap(), kind);
        }
    }
}
