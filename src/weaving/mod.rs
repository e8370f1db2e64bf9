//! Grafting proxy bodies onto target methods.
//!
//! Weaving one matched pair always runs the same linear sequence:
//!
//! 1. [`replace_body`] - the destination's locals, exception handlers and instructions are
//!    replaced wholesale by copies of the proxy's
//! 2. [`shift_arguments`] - if a static proxy lands in an instance method, every access to
//!    declared parameter slot `k` moves to `k + 1`, past the receiver
//! 3. Exit hook - if the proxy type declares one, every `ret` is routed through it
//! 4. Entry hook - if the proxy type declares one, a call passing the method name and all
//!    arguments is prepended
//!
//! The [`Weaver`] is created once per proxy type, which is where hooks are declared, and
//! then applied to every method pair of that type.
//!
//! # Examples
//!
//! ```rust
//! use cilweave::{
//!     metadata::{typesystem::TypeRef, MethodBuilder, TypeBuilder},
//!     weaving::Weaver,
//! };
//!
//! let target = TypeBuilder::new("Demo.Greeter")
//!     .method(MethodBuilder::new("Count").public().returns(TypeRef::int32()).implementation(
//!         |asm| { asm.ldc_i4(1)?.ret()?; Ok(()) },
//!     ))
//!     .build()?;
//! let proxy_type = TypeBuilder::new("Demo.GreeterProxy")
//!     .static_class()
//!     .method(MethodBuilder::new_static("Count").public().returns(TypeRef::int32()).implementation(
//!         |asm| { asm.ldc_i4(42)?.ret()?; Ok(()) },
//!     ))
//!     .build()?;
//!
//! let mut destination = target.methods[0].clone();
//! Weaver::new(&proxy_type)?.weave(&mut destination, &proxy_type.methods[0])?;
//! assert_eq!(destination.body.instructions, proxy_type.methods[0].body.instructions);
//! # Ok::<(), cilweave::Error>(())
//! ```

mod body;
mod hooks;

pub use body::{replace_body, shift_arguments};
pub use hooks::{Hook, HookKind, ENTRY_STACK, EXIT_STACK};

use crate::{
    metadata::{MethodDef, TypeDef},
    Result,
};

/// Weaves the proxy methods of one proxy type into their targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Weaver {
    entry: Option<Hook>,
    exit: Option<Hook>,
}

impl Weaver {
    /// Prepares weaving for the methods of `proxy_type`, resolving its hooks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidEntry`] or [`crate::Error::InvalidExit`] for a hook
    /// with a non-conforming signature, and [`crate::Error::ProxyMistake`] if the type
    /// declares more than one hook of a kind.
    pub fn new(proxy_type: &TypeDef) -> Result<Self> {
        Ok(Weaver {
            entry: Hook::find(HookKind::Entry, proxy_type)?,
            exit: Hook::find(HookKind::Exit, proxy_type)?,
        })
    }

    /// A weaver without hooks
    #[must_use]
    pub fn without_hooks() -> Self {
        Weaver {
            entry: None,
            exit: None,
        }
    }

    /// The verified entry hook, if the proxy type declares one
    #[must_use]
    pub fn entry_hook(&self) -> Option<&Hook> {
        self.entry.as_ref()
    }

    /// The verified exit hook, if the proxy type declares one
    #[must_use]
    pub fn exit_hook(&self) -> Option<&Hook> {
        self.exit.as_ref()
    }

    /// Replaces the body of `destination` with the body of `proxy` and applies the slot shift
    /// and hooks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the resulting body is inconsistent; the
    /// destination is then left partially woven and must be discarded.
    pub fn weave(&self, destination: &mut MethodDef, proxy: &MethodDef) -> Result<()> {
        replace_body(&mut destination.body, &proxy.body);

        if proxy.is_static() && destination.has_this() {
            let shifted = shift_arguments(&mut destination.body, proxy.params.len())?;
            log::debug!(
                "Shifted {} argument access(es) of {} past the receiver",
                shifted,
                destination.qualified_name()
            );
        }

        if let Some(exit) = &self.exit {
            let mut body = std::mem::take(&mut destination.body);
            let wrapped = exit.wrap_returns(&mut body, destination);
            destination.body = body;
            wrapped?;
            destination.body.max_stack = destination.body.max_stack.max(EXIT_STACK);
        }

        if let Some(entry) = &self.entry {
            let preamble = entry.entry_preamble(destination)?;
            destination.body.prepend(preamble);
            destination.body.max_stack = destination.body.max_stack.max(ENTRY_STACK);
        }

        destination.body.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, OpCode, Operand},
        metadata::{
            customattributes::Tag,
            method::{ExceptionHandler, LocalVariable, MethodBody, Parameter},
            typesystem::TypeRef,
        },
        test::{create_method, create_static_method, create_static_type},
    };

    fn proxy_body() -> MethodBody {
        MethodBody {
            max_stack: 2,
            locals: vec![LocalVariable::new(TypeRef::string())],
            instructions: vec![
                Instruction::ldarg(0),
                Instruction::stloc(0),
                Instruction::ldloc(0),
                Instruction::simple(OpCode::Ret),
            ],
            exception_handlers: vec![ExceptionHandler::finally((0, 1), (1, 3))],
            ..MethodBody::default()
        }
    }

    fn proxy_type(hooks: &[Tag]) -> TypeDef {
        let mut ty = create_static_type("Demo.GreeterProxy");
        for tag in hooks {
            let name = match tag {
                Tag::EntryHook => "OnEntry",
                _ => "OnExit",
            };
            let mut hook = create_static_method("Demo.GreeterProxy", name);
            hook.params = vec![
                Parameter::new("name", TypeRef::string()),
                Parameter::new(
                    "value",
                    match tag {
                        Tag::EntryHook => TypeRef::array(TypeRef::object()),
                        _ => TypeRef::object(),
                    },
                ),
            ];
            hook.tags.push(tag.clone());
            ty.methods.push(hook);
        }
        ty
    }

    fn destination(is_static: bool) -> MethodDef {
        let mut method = if is_static {
            create_static_method("Demo.Greeter", "Echo")
        } else {
            create_method("Demo.Greeter", "Echo")
        };
        method.return_type = TypeRef::string();
        method.params.push(Parameter::new("text", TypeRef::string()));
        method.body.instructions = vec![Instruction::simple(OpCode::Nop); 3];
        method.body.locals = vec![LocalVariable::new(TypeRef::int64())];
        method
    }

    fn proxy() -> MethodDef {
        let mut method = create_static_method("Demo.GreeterProxy", "Echo");
        method.return_type = TypeRef::string();
        method.params.push(Parameter::new("text", TypeRef::string()));
        method.body = proxy_body();
        method
    }

    #[test]
    fn static_to_static_is_a_copy() {
        let mut target = destination(true);
        Weaver::without_hooks().weave(&mut target, &proxy()).unwrap();
        assert_eq!(target.body, proxy_body());
    }

    #[test]
    fn static_to_instance_shifts() {
        let mut target = destination(false);
        Weaver::new(&proxy_type(&[]))
            .unwrap()
            .weave(&mut target, &proxy())
            .unwrap();
        assert_eq!(target.body.instructions[0], Instruction::ldarg(1));
        assert_eq!(target.body.instructions[1..], proxy_body().instructions[1..]);
        assert_eq!(target.body.locals, proxy_body().locals);
        assert_eq!(target.body.exception_handlers, proxy_body().exception_handlers);
    }

    #[test]
    fn both_hooks() {
        let weaver = Weaver::new(&proxy_type(&[Tag::EntryHook, Tag::ExitHook])).unwrap();
        assert!(weaver.entry_hook().is_some());
        assert!(weaver.exit_hook().is_some());

        let mut target = destination(false);
        weaver.weave(&mut target, &proxy()).unwrap();

        let body = &target.body;
        // ldstr, ldc.i4.1, newarr, dup, ldc.i4.0, ldarg.1, stelem.ref, call
        assert_eq!(body.instructions[0], Instruction::ldstr("Echo"));
        assert_eq!(body.instructions[5], Instruction::ldarg(1));
        assert!(matches!(
            &body.instructions[7].operand,
            Operand::Method(m) if m.name == "OnEntry"
        ));
        assert_eq!(body.instructions[8], Instruction::ldarg(1));

        // the exit epilogue stores the result into a fresh local
        assert_eq!(body.locals.len(), 2);
        assert_eq!(body.instructions.last(), Some(&Instruction::simple(OpCode::Ret)));
        assert!(body.max_stack >= ENTRY_STACK);

        let handler = &body.exception_handlers[0];
        assert_eq!((handler.try_start, handler.try_end), (8, 9));
    }

    #[test]
    fn invalid_hook_stops_weaving() {
        let mut ty = proxy_type(&[Tag::EntryHook]);
        ty.methods[0].params.pop();
        assert!(matches!(
            Weaver::new(&ty),
            Err(crate::Error::InvalidEntry { .. })
        ));
    }
}
