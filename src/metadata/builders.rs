//! Fluent builders for in-memory modules.
//!
//! The builders compose bottom-up: a [`MethodBodyBuilder`] runs an
//! [`InstructionAssembler`] closure, a [`MethodBuilder`] wraps a body with a signature and
//! attributes, a [`TypeBuilder`] collects methods and properties, and a [`ModuleBuilder`]
//! numbers every token and decodes tags.
//!
//! # Examples
//!
//! ```rust
//! use cilweave::metadata::{
//!     typesystem::TypeRef, MethodBuilder, ModuleBuilder, TypeBuilder,
//! };
//!
//! let module = ModuleBuilder::new("Library")
//!     .add_type(
//!         TypeBuilder::new("Demo.Greeter").public().method(
//!             MethodBuilder::new("Twice")
//!                 .public()
//!                 .param("value", TypeRef::int32())
//!                 .returns(TypeRef::int32())
//!                 .implementation(|asm| {
//!                     asm.ldarg_1()?.ldarg_1()?.add()?.ret()?;
//!                     Ok(())
//!                 }),
//!         ),
//!     )
//!     .build()?;
//!
//! let greeter = module.find_type("Demo.Greeter")?;
//! assert_eq!(greeter.methods[0].body.instructions.len(), 4);
//! # Ok::<(), cilweave::Error>(())
//! ```

use std::path::PathBuf;

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        customattributes::{
            CustomAttribute, CustomAttributeArgument, TargetMethodType, ENTRY_HOOK_ATTRIBUTE,
            EXIT_HOOK_ATTRIBUTE, PROXY_METHOD_ATTRIBUTE, PROXY_OF_ATTRIBUTE, TARGET_METHOD_TYPE,
        },
        generics::GenericParam,
        identity::{PublicKey, Version},
        method::{
            ExceptionHandler, LocalVariable, MethodAccessFlags, MethodBody, MethodDef,
            MethodModifiers, Parameter,
        },
        module::Module,
        token::Token,
        typedef::{assign_tokens, PropertyDef, TypeAttributes, TypeDef},
        typesystem::TypeRef,
    },
    Result,
};

/// Closure emitting the instructions of a body
type ImplementationFn = Box<dyn FnOnce(&mut InstructionAssembler) -> Result<()>>;

/// Builds a [`MethodBody`].
pub struct MethodBodyBuilder {
    max_stack: u16,
    init_locals: bool,
    locals: Vec<LocalVariable>,
    implementation: Option<ImplementationFn>,
    exception_handlers: Vec<ExceptionHandler>,
}

impl Default for MethodBodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodBodyBuilder {
    /// Creates a builder for an empty body
    #[must_use]
    pub fn new() -> Self {
        let defaults = MethodBody::default();
        MethodBodyBuilder {
            max_stack: defaults.max_stack,
            init_locals: defaults.init_locals,
            locals: Vec::new(),
            implementation: None,
            exception_handlers: Vec::new(),
        }
    }

    /// Sets the maximum evaluation stack depth
    #[must_use]
    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Sets whether locals are zero-initialized
    #[must_use]
    pub fn init_locals(mut self, init_locals: bool) -> Self {
        self.init_locals = init_locals;
        self
    }

    /// Appends a local slot
    #[must_use]
    pub fn local(mut self, ty: TypeRef) -> Self {
        self.locals.push(LocalVariable::new(ty));
        self
    }

    /// Appends an exception handling clause; ranges are instruction indices
    #[must_use]
    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handlers.push(handler);
        self
    }

    /// Sets the closure emitting the instructions
    #[must_use]
    pub fn implementation<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut InstructionAssembler) -> Result<()> + 'static,
    {
        self.implementation = Some(Box::new(f));
        self
    }

    /// Runs the implementation and checks the resulting body.
    ///
    /// # Errors
    ///
    /// Propagates errors of the implementation closure, and returns
    /// [`crate::Error::Malformed`] if the body fails [`MethodBody::validate`].
    pub fn build(self) -> Result<MethodBody> {
        let instructions = match self.implementation {
            Some(implementation) => {
                let mut asm = InstructionAssembler::new();
                implementation(&mut asm)?;
                asm.finish()?
            }
            None => Vec::new(),
        };

        let body = MethodBody {
            max_stack: self.max_stack,
            init_locals: self.init_locals,
            locals: self.locals,
            instructions,
            exception_handlers: self.exception_handlers,
        };
        body.validate()?;
        Ok(body)
    }
}

/// Builds a [`MethodDef`].
pub struct MethodBuilder {
    name: String,
    access: MethodAccessFlags,
    modifiers: MethodModifiers,
    return_type: TypeRef,
    params: Vec<Parameter>,
    generic_params: Vec<GenericParam>,
    custom_attributes: Vec<CustomAttribute>,
    body: MethodBodyBuilder,
}

impl MethodBuilder {
    /// An instance method returning `System.Void`
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            access: MethodAccessFlags::PRIVATE,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            return_type: TypeRef::void(),
            params: Vec::new(),
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            body: MethodBodyBuilder::new(),
        }
    }

    /// A static method returning `System.Void`
    #[must_use]
    pub fn new_static(name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.modifiers |= MethodModifiers::STATIC;
        builder
    }

    /// An instance constructor
    #[must_use]
    pub fn constructor() -> Self {
        let mut builder = Self::new(crate::metadata::method::CONSTRUCTOR_NAME).public();
        builder.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;
        builder
    }

    /// Makes the method public
    #[must_use]
    pub fn public(mut self) -> Self {
        self.access = MethodAccessFlags::PUBLIC;
        self
    }

    /// Makes the method private
    #[must_use]
    pub fn private(mut self) -> Self {
        self.access = MethodAccessFlags::PRIVATE;
        self
    }

    /// Makes the method visible inside its assembly only
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.access = MethodAccessFlags::ASSEM;
        self
    }

    /// Adds modifier flags
    #[must_use]
    pub fn modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    /// Appends an `in` parameter
    #[must_use]
    pub fn param(self, name: &str, ty: TypeRef) -> Self {
        self.parameter(Parameter::new(name, ty))
    }

    /// Appends a parameter
    #[must_use]
    pub fn parameter(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Appends a generic parameter
    #[must_use]
    pub fn generic(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.custom_attributes.push(attribute);
        self
    }

    /// Declares the method as standing in for a `kind` method of the target type, named
    /// `name` or, when `None`, like this method
    #[must_use]
    pub fn proxy_method(self, kind: TargetMethodType, name: Option<&str>) -> Self {
        let mut attribute = CustomAttribute::new(PROXY_METHOD_ATTRIBUTE).arg(
            CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.to_string(), kind.value()),
        );
        if let Some(name) = name {
            attribute = attribute.arg(CustomAttributeArgument::String(name.to_string()));
        }
        self.attribute(attribute)
    }

    /// Declares the method as the entry hook of its type
    #[must_use]
    pub fn entry_hook(self) -> Self {
        self.attribute(CustomAttribute::new(ENTRY_HOOK_ATTRIBUTE))
    }

    /// Declares the method as the exit hook of its type
    #[must_use]
    pub fn exit_hook(self) -> Self {
        self.attribute(CustomAttribute::new(EXIT_HOOK_ATTRIBUTE))
    }

    /// Replaces the body builder
    #[must_use]
    pub fn body(mut self, body: MethodBodyBuilder) -> Self {
        self.body = body;
        self
    }

    /// Sets the closure emitting the body's instructions
    #[must_use]
    pub fn implementation<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut InstructionAssembler) -> Result<()> + 'static,
    {
        self.body = self.body.implementation(f);
        self
    }

    /// Builds the method as a member of `declaring_type` with a provisional token
    pub fn build(self, declaring_type: &str, token: Token) -> Result<MethodDef> {
        Ok(MethodDef {
            token,
            name: self.name,
            declaring_type: declaring_type.to_string(),
            flags_access: self.access,
            flags_modifiers: self.modifiers,
            return_type: self.return_type,
            params: self.params,
            generic_params: self.generic_params,
            custom_attributes: self.custom_attributes,
            tags: Vec::new(),
            body: self.body.build()?,
        })
    }
}

/// Builds a [`PropertyDef`] whose accessors are named methods of the same type.
pub struct PropertyBuilder {
    name: String,
    ty: TypeRef,
    getter: Option<String>,
    setter: Option<String>,
    custom_attributes: Vec<CustomAttribute>,
}

impl PropertyBuilder {
    /// A property without accessors
    #[must_use]
    pub fn new(name: &str, ty: TypeRef) -> Self {
        PropertyBuilder {
            name: name.to_string(),
            ty,
            getter: None,
            setter: None,
            custom_attributes: Vec::new(),
        }
    }

    /// Names the getter method
    #[must_use]
    pub fn getter(mut self, method: &str) -> Self {
        self.getter = Some(method.to_string());
        self
    }

    /// Names the setter method
    #[must_use]
    pub fn setter(mut self, method: &str) -> Self {
        self.setter = Some(method.to_string());
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.custom_attributes.push(attribute);
        self
    }

    /// Declares every accessor as standing in for the same-named `kind` accessor of the
    /// target type
    #[must_use]
    pub fn proxy_method(self, kind: TargetMethodType) -> Self {
        self.attribute(CustomAttribute::new(PROXY_METHOD_ATTRIBUTE).arg(
            CustomAttributeArgument::Enum(TARGET_METHOD_TYPE.to_string(), kind.value()),
        ))
    }

    fn build(self, owner: &str, methods: &[MethodDef]) -> Result<PropertyDef> {
        let resolve = |name: Option<String>| -> Result<Option<Token>> {
            let Some(name) = name else {
                return Ok(None);
            };
            methods
                .iter()
                .find(|method| method.name == name)
                .map(|method| Some(method.token))
                .ok_or_else(|| {
                    malformed_error!(
                        "Property {}::{} names missing accessor {}",
                        owner,
                        self.name,
                        name
                    )
                })
        };
        let getter = resolve(self.getter.clone())?;
        let setter = resolve(self.setter.clone())?;

        Ok(PropertyDef {
            name: self.name,
            ty: self.ty,
            custom_attributes: self.custom_attributes,
            getter,
            setter,
        })
    }
}

/// Builds a [`TypeDef`].
pub struct TypeBuilder {
    namespace: String,
    name: String,
    flags: TypeAttributes,
    generic_params: Vec<GenericParam>,
    custom_attributes: Vec<CustomAttribute>,
    methods: Vec<MethodBuilder>,
    properties: Vec<PropertyBuilder>,
}

impl TypeBuilder {
    /// A non-public class; `full_name` is split at its last `.` into namespace and name
    #[must_use]
    pub fn new(full_name: &str) -> Self {
        let (namespace, name) = match full_name.rfind('.') {
            Some(index) => (&full_name[..index], &full_name[index + 1..]),
            None => ("", full_name),
        };
        TypeBuilder {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::empty(),
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Makes the type public
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags |= TypeAttributes::PUBLIC;
        self
    }

    /// Makes the type a static class (abstract and sealed)
    #[must_use]
    pub fn static_class(mut self) -> Self {
        self.flags |= TypeAttributes::STATIC_CLASS;
        self
    }

    /// Adds type attribute flags
    #[must_use]
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Appends a generic parameter
    #[must_use]
    pub fn generic(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.custom_attributes.push(attribute);
        self
    }

    /// Declares the type as standing in for `target`
    #[must_use]
    pub fn proxy_of(self, target: TypeRef) -> Self {
        self.attribute(
            CustomAttribute::new(PROXY_OF_ATTRIBUTE).arg(CustomAttributeArgument::Type(target)),
        )
    }

    /// Appends a method
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Appends a property
    #[must_use]
    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    /// Builds the type with provisional tokens.
    ///
    /// # Errors
    ///
    /// Propagates method body failures and returns [`crate::Error::Malformed`] for a
    /// property naming an accessor the type does not declare.
    pub fn build(self) -> Result<TypeDef> {
        let full_name = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };

        let methods = (1u32..)
            .zip(self.methods)
            .map(|(row, method)| method.build(&full_name, Token::methoddef(row)))
            .collect::<Result<Vec<_>>>()?;
        let properties = self
            .properties
            .into_iter()
            .map(|property| property.build(&full_name, &methods))
            .collect::<Result<Vec<_>>>()?;

        Ok(TypeDef {
            token: Token::typedef(1),
            namespace: self.namespace,
            name: self.name,
            flags: self.flags,
            generic_params: self.generic_params,
            custom_attributes: self.custom_attributes,
            tags: Vec::new(),
            properties,
            methods,
        })
    }
}

/// Builds a [`Module`].
pub struct ModuleBuilder {
    name: String,
    path: Option<PathBuf>,
    version: Version,
    public_key: Option<PublicKey>,
    types: Vec<TypeBuilder>,
}

impl ModuleBuilder {
    /// An empty module named `name`, stored as `<name>.dll` unless a path is given
    #[must_use]
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            name: name.to_string(),
            path: None,
            version: Version::ZERO,
            public_key: None,
            types: Vec::new(),
        }
    }

    /// Sets the file path
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the version
    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the public key
    #[must_use]
    pub fn public_key(mut self, blob: Vec<u8>) -> Self {
        self.public_key = Some(PublicKey::new(blob));
        self
    }

    /// Appends a type
    #[must_use]
    pub fn add_type(mut self, ty: TypeBuilder) -> Self {
        self.types.push(ty);
        self
    }

    /// Builds every type, assigns final tokens and decodes tags.
    ///
    /// # Errors
    ///
    /// Propagates [`TypeBuilder::build`] and [`Module::from_types`] failures.
    pub fn build(self) -> Result<Module> {
        let mut types = self
            .types
            .into_iter()
            .map(TypeBuilder::build)
            .collect::<Result<Vec<_>>>()?;
        assign_tokens(&mut types);

        let path = self
            .path
            .unwrap_or_else(|| PathBuf::from(format!("{}.dll", self.name)));
        let mut module = Module::from_types(&self.name, path, types)?;
        module.set_version(self.version);
        module.set_public_key(self.public_key);
        Ok(module)
    }
}
