//! Type definitions and their properties.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::metadata::{
    customattributes::{CustomAttribute, Tag, TagKind},
    generics::GenericParam,
    method::{MemberKind, MethodDef},
    token::Token,
    typesystem::TypeRef,
};

/// Name of the compiler-synthesized placeholder type holding module-level members
pub const MODULE_PLACEHOLDER: &str = "<Module>";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type attributes (`TypeDef.Flags`)
    pub struct TypeAttributes: u32 {
        /// Visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested, visible everywhere the enclosing type is
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested, visible only inside the enclosing type
        const NESTED_PRIVATE = 0x0000_0003;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Fields are laid out at explicit offsets
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// The type is an interface
        const INTERFACE = 0x0000_0020;
        /// The type cannot be instantiated
        const ABSTRACT = 0x0000_0080;
        /// The type cannot be derived from
        const SEALED = 0x0000_0100;
        /// The name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// The type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Static constructor may run lazily
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// Mask selecting the visibility bits of [`TypeAttributes`]
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;

impl TypeAttributes {
    /// The attributes of a C# `static class`
    pub const STATIC_CLASS: TypeAttributes = TypeAttributes::PUBLIC
        .union(TypeAttributes::ABSTRACT)
        .union(TypeAttributes::SEALED)
        .union(TypeAttributes::BEFORE_FIELD_INIT);

    /// Returns true if the visibility bits say public
    #[must_use]
    pub fn is_public(self) -> bool {
        self.bits() & TYPE_VISIBILITY_MASK == TypeAttributes::PUBLIC.bits()
    }
}

/// A property of a type, reduced to its tags and accessor methods.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Property type
    pub ty: TypeRef,
    /// Raw custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Getter method, if any
    pub getter: Option<Token>,
    /// Setter method, if any
    pub setter: Option<Token>,
}

impl PropertyDef {
    /// Tokens of the accessor methods, getter first
    #[must_use]
    pub fn accessors(&self) -> Vec<Token> {
        self.getter.into_iter().chain(self.setter).collect()
    }
}

/// A type defined by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Token of this type
    pub token: Token,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Short name
    pub name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// Generic parameters, in order
    pub generic_params: Vec<GenericParam>,
    /// Raw custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Tags decoded from `custom_attributes` at load time
    pub tags: Vec<Tag>,
    /// Properties
    pub properties: Vec<PropertyDef>,
    /// Methods, in declaration order
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// `Namespace.Name`, or `Name` in the global namespace
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true for static classes (abstract and sealed)
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags
            .contains(TypeAttributes::ABSTRACT | TypeAttributes::SEALED)
    }

    /// Returns true for the compiler-synthesized `<Module>` placeholder
    #[must_use]
    pub fn is_module_placeholder(&self) -> bool {
        self.namespace.is_empty() && self.name == MODULE_PLACEHOLDER
    }

    /// Returns true if the type carries a tag of the given kind
    #[must_use]
    pub fn has_tag(&self, kind: TagKind) -> bool {
        self.tags.iter().any(|tag| tag.kind() == kind)
    }

    /// Returns true if the type carries every tag in `kinds`
    #[must_use]
    pub fn has_tags(&self, kinds: &[TagKind]) -> bool {
        kinds.iter().all(|kind| self.has_tag(*kind))
    }

    /// The type this type stands in for, from its `ProxyOf` tag
    #[must_use]
    pub fn proxy_target(&self) -> Option<&TypeRef> {
        self.tags.iter().find_map(|tag| match tag {
            Tag::ProxyOf { target } => Some(target),
            _ => None,
        })
    }

    /// Methods passing the static-ness filter and carrying every tag in `required`
    pub fn find_methods<'a>(
        &'a self,
        kind: MemberKind,
        required: &'a [TagKind],
    ) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods
            .iter()
            .filter(move |method| kind.accepts(method.is_static()) && method.has_tags(required))
    }

    /// Method by token
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.token == token)
    }

    /// Mutable method by token
    pub fn method_mut(&mut self, token: Token) -> Option<&mut MethodDef> {
        self.methods.iter_mut().find(|method| method.token == token)
    }
}

/// Renumbers the types and methods of a module sequentially, remapping property accessors.
///
/// Accessor tokens are resolved within their own type, so the input tokens only need to be
/// unique per type.
pub(crate) fn assign_tokens(types: &mut [TypeDef]) {
    let mut method_row = 1u32;
    for (type_row, ty) in (1u32..).zip(types.iter_mut()) {
        ty.token = Token::typedef(type_row);

        let mut remap = HashMap::new();
        for method in &mut ty.methods {
            let token = Token::methoddef(method_row);
            remap.insert(method.token, token);
            method.token = token;
            method_row += 1;
        }

        for property in &mut ty.properties {
            for accessor in [&mut property.getter, &mut property.setter]
                .into_iter()
                .flatten()
            {
                if let Some(token) = remap.get(&*accessor) {
                    *accessor = *token;
                }
            }
        }
    }
}
