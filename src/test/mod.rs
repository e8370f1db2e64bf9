//! Shared factories for unit tests.


pub use scenarios::*;

use crate::metadata::{
    customattributes::{
        CustomAttribute, CustomAttributeArgument, ENTRY_HOOK_ATTRIBUTE, EXIT_HOOK_ATTRIBUTE,
        PROXY_METHOD_ATTRIBUTE, PROXY_OF_ATTRIBUTE, TARGET_METHOD_TYPE,
    },
    customattributes::TargetMethodType,
    method::{MethodAccessFlags, MethodBody, MethodDef, MethodModifiers},
    token::Token,
    typesystem::{TypeRef, TypeScope},
    Module, TypeAttributes, TypeDef,
};

/// Name of the target module used throughout the unit tests
pub const LIBRARY: &str = "Library";
/// Name of the proxy module used throughout the unit tests
pub const PROXIES: &str = "Proxies";

// Helper function to create a public instance method returning void with an empty body
pub fn create_method(declaring_type: &str, name: &str) -> MethodDef {
    MethodDef {
        token: Token::methoddef(1),
        name: name.to_string(),
        declaring_type: declaring_type.to_string(),
        flags_access: MethodAccessFlags::PUBLIC,
        flags_modifiers: MethodModifiers::HIDE_BY_SIG,
        return_type: TypeRef::void(),
        params: Vec::new(),
        generic_params: Vec::new(),
        custom_attributes: Vec::new(),
        tags: Vec::new(),
        body: MethodBody::default(),
    }
}

// Helper function to create a public static method returning void with an empty body
pub fn create_static_method(declaring_type: &str, name: &str) -> MethodDef {
    let mut method = create_method(declaring_type, name);
    method.flags_modifiers |= MethodModifiers::STATIC;
    method
}

// Helper function to create a public class without members
pub fn create_type(full_name: &str) -> TypeDef {
    let (namespace, name) = match full_name.rfind('.') {
        Some(index) => (&full_name[..index], &full_name[index + 1..]),
        None => ("", full_name),
    };
    TypeDef {
        token: Token::typedef(1),
        namespace: namespace.to_string(),
        name: name.to_string(),
        flags: TypeAttributes::PUBLIC,
        generic_params: Vec::new(),
        custom_attributes: Vec::new(),
        tags: Vec::new(),
        properties: Vec::new(),
        methods: Vec::new(),
    }
}

// Helper function to create a static class without members
pub fn create_static_type(full_name: &str) -> TypeDef {
    let mut ty = create_type(full_name);
    ty.flags = TypeAttributes::STATIC_CLASS;
    ty
}

// Helper function to create a loaded module with unique tokens and decoded tags
pub fn create_module(name: &str, mut types: Vec<TypeDef>) -> Module {
    crate::metadata::assign_tokens(&mut types);
    Module::from_types(name, format!("{name}.dll"), types).unwrap()
}

// Helper function to reference a type of the target module from another module
pub fn library_ref(full_name: &str) -> TypeRef {
    TypeRef::class(full_name).with_scope(TypeScope::External(LIBRARY.to_string()))
}

// Helper function to create a ProxyOf attribute naming a type of `assembly`
pub fn proxy_of(target: &str, assembly: &str) -> CustomAttribute {
    CustomAttribute::new(PROXY_OF_ATTRIBUTE).arg(CustomAttributeArgument::Type(
        TypeRef::class(target).with_scope(TypeScope::External(assembly.to_string())),
    ))
}

// Helper function to create a ProxyMethod attribute
pub fn proxy_method(kind: TargetMethodType, name: Option<&str>) -> CustomAttribute {
    let attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE).arg(
        CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.to_string(), kind.value()),
    );
    match name {
        Some(name) => attribute.arg(CustomAttributeArgument::String(name.to_string())),
        None => attribute,
    }
}

// Helper function to create an EntryHook attribute
pub fn entry_hook() -> CustomAttribute {
    CustomAttribute::new(ENTRY_HOOK_ATTRIBUTE)
}

// Helper function to create an ExitHook attribute
pub fn exit_hook() -> CustomAttribute {
    CustomAttribute::new(EXIT_HOOK_ATTRIBUTE)
}
