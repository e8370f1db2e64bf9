//! Entry and exit hooks: signature checks and the synthesized call sites.
//!
//! An entry hook is called first thing in every woven method with the method's name and an
//! array holding its arguments. An exit hook is called right before every return with the
//! method's name and the value about to be returned (`null` for `void` methods).

use std::collections::HashMap;

use crate::{
    assembly::{Instruction, OpCode},
    metadata::{
        customattributes::TagKind,
        method::{MethodBody, MethodRef},
        typesystem::TypeRef,
        MemberKind, MethodDef, TypeDef,
    },
    Error, Result,
};

/// Evaluation stack depth the entry preamble needs: name, array, array, index, value
pub const ENTRY_STACK: u16 = 5;
/// Evaluation stack depth the exit epilogue needs: name, value
pub const EXIT_STACK: u16 = 2;

/// Which hook a [`Hook`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Runs before every call
    Entry,
    /// Runs before every return
    Exit,
}

impl HookKind {
    fn tag(self) -> TagKind {
        match self {
            HookKind::Entry => TagKind::EntryHook,
            HookKind::Exit => TagKind::ExitHook,
        }
    }

    fn label(self) -> &'static str {
        match self {
            HookKind::Entry => "entry hook",
            HookKind::Exit => "exit hook",
        }
    }

    fn invalid(self, method: &MethodDef, rule: &'static str) -> Error {
        let method = method.qualified_name();
        match self {
            HookKind::Entry => Error::InvalidEntry { method, rule },
            HookKind::Exit => Error::InvalidExit { method, rule },
        }
    }
}

/// A verified hook method, ready to be called from woven code.
#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
    /// Entry or exit
    pub kind: HookKind,
    /// The call target
    pub method: MethodRef,
    /// For entry hooks the element type of the argument array, for exit hooks the type of
    /// the value parameter
    pub value_type: TypeRef,
}

impl Hook {
    /// Verifies the signature of `method` as a hook of the given kind.
    ///
    /// Both kinds must be public, static, non-generic and return `void`, taking exactly two
    /// plain parameters without default values or other markers, the first one a
    /// `System.String`. The second one is an array of a reference type for entry hooks, its
    /// element type being what boxed arguments are stored as, and a reference type for exit
    /// hooks.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEntry`] or [`Error::InvalidExit`] naming the first violated rule.
    pub fn verify(kind: HookKind, method: &MethodDef) -> Result<Self> {
        if !method.is_public() {
            return Err(kind.invalid(method, "the method must be public"));
        }
        if !method.is_static() {
            return Err(kind.invalid(method, "the method must be static"));
        }
        if method.is_generic() {
            return Err(kind.invalid(method, "the method must not be generic"));
        }
        if !method.returns_void() {
            return Err(kind.invalid(method, "the method must return void"));
        }
        let [name, value] = method.params.as_slice() else {
            return Err(kind.invalid(method, "the method must take exactly two parameters"));
        };
        if name.has_markers() || value.has_markers() {
            return Err(kind.invalid(
                method,
                "the parameters must not carry default values or other markers",
            ));
        }
        if name.variant.is_by_ref() || value.variant.is_by_ref() {
            return Err(kind.invalid(method, "the parameters must be passed by value"));
        }
        if !name.ty.is_string() {
            return Err(kind.invalid(method, "the first parameter must be a string"));
        }

        let value_type = match kind {
            HookKind::Entry => {
                let element = value
                    .ty
                    .element()
                    .cloned()
                    .ok_or_else(|| kind.invalid(method, "the second parameter must be an array"))?;
                if element.is_value_type() {
                    return Err(kind.invalid(
                        method,
                        "the second parameter must be an array of a reference type",
                    ));
                }
                element
            }
            HookKind::Exit => {
                if value.ty.is_value_type() {
                    return Err(kind.invalid(
                        method,
                        "the second parameter must be of a reference type",
                    ));
                }
                value.ty.clone()
            }
        };

        Ok(Hook {
            kind,
            method: method.reference(),
            value_type,
        })
    }

    /// Finds and verifies the hook of the given kind declared by `proxy_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProxyMistake`] if the type declares more than one, and the errors of
    /// [`Hook::verify`].
    pub fn find(kind: HookKind, proxy_type: &TypeDef) -> Result<Option<Self>> {
        let required = [kind.tag()];
        let candidates: Vec<&MethodDef> = proxy_type
            .find_methods(MemberKind::Any, &required)
            .collect();
        match candidates.as_slice() {
            [] => Ok(None),
            [method] => Self::verify(kind, method).map(Some),
            _ => {
                let names: Vec<String> =
                    candidates.iter().map(|m| m.qualified_name()).collect();
                Err(Error::ProxyMistake(format!(
                    "The proxy type {} declares more than one {}: {}",
                    proxy_type.full_name(),
                    kind.label(),
                    names.join(", ")
                )))
            }
        }
    }

    /// The instructions calling this entry hook for `destination`.
    ///
    /// Pushes the destination's name and a new array holding each declared argument, read
    /// from its slot in the destination frame; by-reference arguments are dereferenced and
    /// value types are boxed. Then calls the hook.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the parameter count does not fit the literals.
    pub fn entry_preamble(&self, destination: &MethodDef) -> Result<Vec<Instruction>> {
        let count = i32::try_from(destination.params.len()).map_err(|_| {
            malformed_error!(
                "{} has too many parameters for an entry hook",
                destination.qualified_name()
            )
        })?;

        let mut preamble = vec![
            Instruction::ldstr(&destination.name),
            Instruction::ldc_i4(count),
            Instruction::with_type(OpCode::Newarr, self.value_type.clone()),
        ];
        for (literal, (index, param)) in (0..count).zip(destination.params.iter().enumerate()) {
            preamble.push(Instruction::simple(OpCode::Dup));
            preamble.push(Instruction::ldc_i4(literal));
            preamble.push(Instruction::ldarg(destination.argument_slot(index)?));
            if param.variant.is_by_ref() {
                preamble.push(Instruction::with_type(OpCode::Ldobj, param.ty.clone()));
            }
            if param.ty.is_value_type() {
                preamble.push(Instruction::with_type(OpCode::Box, param.ty.clone()));
            }
            preamble.push(Instruction::simple(OpCode::StelemRef));
        }
        preamble.push(Instruction::call(self.method.clone()));

        Ok(preamble)
    }

    /// Routes every `ret` of `body` through a call to this exit hook.
    ///
    /// Each `ret` is preceded by an epilogue passing the destination's name and the value
    /// about to be returned, kept in a new local for non-`void` methods. Branches that
    /// targeted a `ret` land on the start of its epilogue.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no local slot is left for the return value.
    pub fn wrap_returns(&self, body: &mut MethodBody, destination: &MethodDef) -> Result<usize> {
        let returns = body.returns();
        if returns.is_empty() {
            return Ok(0);
        }

        let epilogue = if destination.returns_void() {
            vec![
                Instruction::ldstr(&destination.name),
                Instruction::simple(OpCode::Ldnull),
                Instruction::call(self.method.clone()),
            ]
        } else {
            let slot = body.add_local(destination.return_type.clone())?;
            let mut epilogue = vec![
                Instruction::stloc(slot),
                Instruction::ldstr(&destination.name),
                Instruction::ldloc(slot),
            ];
            if destination.return_type.is_value_type() {
                epilogue.push(Instruction::with_type(
                    OpCode::Box,
                    destination.return_type.clone(),
                ));
            }
            epilogue.push(Instruction::call(self.method.clone()));
            epilogue.push(Instruction::ldloc(slot));
            epilogue
        };

        let old = std::mem::take(&mut body.instructions);
        let mut positions = HashMap::with_capacity(old.len() + 1);
        let mut instructions = Vec::with_capacity(old.len() + returns.len() * epilogue.len());
        for (index, instruction) in old.into_iter().enumerate() {
            positions.insert(index, instructions.len());
            if instruction.opcode == OpCode::Ret {
                instructions.extend(epilogue.iter().cloned());
            }
            instructions.push(instruction);
        }
        positions.insert(positions.len(), instructions.len());

        body.instructions = instructions;
        body.relocate(|index| positions.get(&index).copied().unwrap_or(index));

        Ok(returns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::Operand,
        metadata::method::{
            ExceptionHandler, MethodAccessFlags, ParamAttributes, Parameter, ParameterVariant,
        },
        test::{create_method, create_static_method, create_static_type, entry_hook, exit_hook},
    };

    fn entry_method() -> MethodDef {
        let mut method = create_static_method("Demo.GreeterProxy", "OnEntry");
        method.params = vec![
            Parameter::new("name", TypeRef::string()),
            Parameter::new("arguments", TypeRef::array(TypeRef::object())),
        ];
        method
    }

    fn exit_method() -> MethodDef {
        let mut method = create_static_method("Demo.GreeterProxy", "OnExit");
        method.params = vec![
            Parameter::new("name", TypeRef::string()),
            Parameter::new("result", TypeRef::object()),
        ];
        method
    }

    fn say_hello() -> MethodDef {
        let mut method = create_method("Demo.Greeter", "SayHello");
        method.return_type = TypeRef::string();
        method.params = vec![
            Parameter::new("name", TypeRef::string()),
            Parameter::new("count", TypeRef::int32()),
        ];
        method
    }

    #[test]
    fn valid_entry_hook() {
        let hook = Hook::verify(HookKind::Entry, &entry_method()).unwrap();
        assert_eq!(hook.value_type, TypeRef::object());
        assert_eq!(hook.method.qualified_name(), "Demo.GreeterProxy::OnEntry");
        assert!(!hook.method.has_this);
    }

    #[test]
    fn entry_hook_rules() {
        let violations: [(fn(&mut MethodDef), &str); 10] = [
            (|m: &mut MethodDef| m.flags_access = MethodAccessFlags::PRIVATE, "public"),
            (|m: &mut MethodDef| m.flags_modifiers.remove(crate::metadata::method::MethodModifiers::STATIC), "static"),
            (
                |m: &mut MethodDef| m.generic_params.push(crate::metadata::generics::GenericParam::new("T")),
                "generic",
            ),
            (|m: &mut MethodDef| m.return_type = TypeRef::boolean(), "void"),
            (|m: &mut MethodDef| m.params.truncate(1), "two parameters"),
            (|m: &mut MethodDef| m.params[1].flags |= ParamAttributes::HAS_DEFAULT, "markers"),
            (|m: &mut MethodDef| m.params[0].variant = ParameterVariant::Ref, "by value"),
            (|m: &mut MethodDef| m.params[0].ty = TypeRef::object(), "string"),
            (|m: &mut MethodDef| m.params[1].ty = TypeRef::object(), "array"),
            (
                |m: &mut MethodDef| m.params[1].ty = TypeRef::array(TypeRef::int32()),
                "reference type",
            ),
        ];

        for (mutate, rule) in violations {
            let mut method = entry_method();
            mutate(&mut method);
            match Hook::verify(HookKind::Entry, &method) {
                Err(Error::InvalidEntry { method, rule: violated }) => {
                    assert_eq!(method, "Demo.GreeterProxy::OnEntry");
                    assert!(violated.contains(rule), "{violated} does not mention {rule}");
                }
                other => panic!("expected an invalid entry hook for {rule}, got {other:?}"),
            }
        }
    }

    #[test]
    fn exit_hook_takes_a_value() {
        let hook = Hook::verify(HookKind::Exit, &exit_method()).unwrap();
        assert_eq!(hook.value_type, TypeRef::object());

        let mut method = exit_method();
        method.return_type = TypeRef::int32();
        assert!(matches!(
            Hook::verify(HookKind::Exit, &method),
            Err(Error::InvalidExit { .. })
        ));

        let mut method = exit_method();
        method.params[1].ty = TypeRef::int32();
        match Hook::verify(HookKind::Exit, &method) {
            Err(Error::InvalidExit { rule, .. }) => assert!(rule.contains("reference type")),
            other => panic!("expected an invalid exit hook, got {other:?}"),
        }
    }

    #[test]
    fn find_hooks() {
        let mut ty = create_static_type("Demo.GreeterProxy");
        assert_eq!(Hook::find(HookKind::Entry, &ty).unwrap(), None);

        let mut hook = entry_method();
        hook.custom_attributes.push(entry_hook());
        ty.methods.push(hook);
        ty.methods[0].tags = vec![crate::metadata::customattributes::Tag::EntryHook];
        assert!(Hook::find(HookKind::Entry, &ty).unwrap().is_some());
        assert_eq!(Hook::find(HookKind::Exit, &ty).unwrap(), None);

        let mut second = entry_method();
        second.name = "OnEntryAgain".to_string();
        second.tags = vec![crate::metadata::customattributes::Tag::EntryHook];
        ty.methods.push(second);
        match Hook::find(HookKind::Entry, &ty) {
            Err(Error::ProxyMistake(message)) => {
                assert!(message.contains("OnEntry, Demo.GreeterProxy::OnEntryAgain"));
            }
            other => panic!("expected a proxy mistake, got {other:?}"),
        }

        let mut exit = exit_method();
        exit.custom_attributes.push(exit_hook());
        exit.tags = vec![crate::metadata::customattributes::Tag::ExitHook];
        ty.methods.push(exit);
        assert!(Hook::find(HookKind::Exit, &ty).unwrap().is_some());
    }

    #[test]
    fn entry_preamble_layout() {
        let hook = Hook::verify(HookKind::Entry, &entry_method()).unwrap();
        let preamble = hook.entry_preamble(&say_hello()).unwrap();

        let expected = vec![
            Instruction::ldstr("SayHello"),
            Instruction::ldc_i4(2),
            Instruction::with_type(OpCode::Newarr, TypeRef::object()),
            Instruction::simple(OpCode::Dup),
            Instruction::ldc_i4(0),
            Instruction::ldarg(1),
            Instruction::simple(OpCode::StelemRef),
            Instruction::simple(OpCode::Dup),
            Instruction::ldc_i4(1),
            Instruction::ldarg(2),
            Instruction::with_type(OpCode::Box, TypeRef::int32()),
            Instruction::simple(OpCode::StelemRef),
            Instruction::call(hook.method.clone()),
        ];
        assert_eq!(preamble, expected);
    }

    #[test]
    fn entry_preamble_static_destination_and_by_ref() {
        let hook = Hook::verify(HookKind::Entry, &entry_method()).unwrap();
        let mut destination = create_static_method("Demo.Greeter", "TryParse");
        destination.params = vec![
            Parameter::new("text", TypeRef::string()),
            Parameter::new("value", TypeRef::int32()).variant(ParameterVariant::Out),
        ];

        let preamble = hook.entry_preamble(&destination).unwrap();
        assert_eq!(preamble[5], Instruction::ldarg(0));
        assert_eq!(preamble[9], Instruction::ldarg(1));
        assert_eq!(preamble[10], Instruction::with_type(OpCode::Ldobj, TypeRef::int32()));
        assert_eq!(preamble[11], Instruction::with_type(OpCode::Box, TypeRef::int32()));
    }

    #[test]
    fn entry_preamble_without_parameters() {
        let hook = Hook::verify(HookKind::Entry, &entry_method()).unwrap();
        let preamble = hook
            .entry_preamble(&create_method("Demo.Greeter", "Reset"))
            .unwrap();
        assert_eq!(preamble.len(), 4);
        assert_eq!(preamble[1], Instruction::ldc_i4(0));
    }

    #[test]
    fn wrap_returns_keeps_the_value() {
        let hook = Hook::verify(HookKind::Exit, &exit_method()).unwrap();
        let mut destination = say_hello();
        destination.return_type = TypeRef::int32();
        let mut body = MethodBody {
            instructions: vec![
                Instruction::ldarg(1),
                Instruction::new(OpCode::Brtrue, Operand::Target(3)),
                Instruction::new(OpCode::Br, Operand::Target(5)),
                Instruction::ldc_i4(1),
                Instruction::simple(OpCode::Ret),
                Instruction::ldc_i4(0),
                Instruction::simple(OpCode::Ret),
            ],
            exception_handlers: vec![ExceptionHandler::fault((0, 3), (3, 7))],
            ..MethodBody::default()
        };

        assert_eq!(hook.wrap_returns(&mut body, &destination).unwrap(), 2);
        assert_eq!(body.locals.len(), 1);
        assert_eq!(body.instructions.len(), 7 + 2 * 6);

        // ldc.i4.1, then the first epilogue
        assert_eq!(body.instructions[3], Instruction::ldc_i4(1));
        assert_eq!(body.instructions[4], Instruction::stloc(0));
        assert_eq!(body.instructions[5], Instruction::ldstr("SayHello"));
        assert_eq!(body.instructions[6], Instruction::ldloc(0));
        assert_eq!(body.instructions[7], Instruction::with_type(OpCode::Box, TypeRef::int32()));
        assert_eq!(body.instructions[8], Instruction::call(hook.method.clone()));
        assert_eq!(body.instructions[9], Instruction::ldloc(0));
        assert_eq!(body.instructions[10], Instruction::simple(OpCode::Ret));

        assert_eq!(body.instructions[1].operand, Operand::Target(3));
        assert_eq!(body.instructions[2].operand, Operand::Target(11));
        let handler = &body.exception_handlers[0];
        assert_eq!((handler.handler_start, handler.handler_end), (3, 19));
        body.validate().unwrap();
    }

    #[test]
    fn wrap_returns_void() {
        let hook = Hook::verify(HookKind::Exit, &exit_method()).unwrap();
        let destination = create_method("Demo.Greeter", "Reset");
        let mut body = MethodBody {
            instructions: vec![
                Instruction::new(OpCode::Br, Operand::Target(1)),
                Instruction::simple(OpCode::Ret),
            ],
            ..MethodBody::default()
        };

        hook.wrap_returns(&mut body, &destination).unwrap();
        assert!(body.locals.is_empty());
        assert_eq!(
            body.instructions,
            vec![
                Instruction::new(OpCode::Br, Operand::Target(1)),
                Instruction::ldstr("Reset"),
                Instruction::simple(OpCode::Ldnull),
                Instruction::call(hook.method.clone()),
                Instruction::simple(OpCode::Ret),
            ]
        );
    }
}
