//! Stack-machine execution of method bodies.

use std::cmp::Ordering;

use crate::{
    assembly::{Instruction, OpCode, Operand},
    emulation::{EmValue, EmulationError, NativeRegistry},
    metadata::{
        method::{MethodDef, MethodRef},
        typesystem::TypeRef,
        Module, TypeDef,
    },
    Result,
};

/// Instructions executed before a run is aborted
pub const DEFAULT_STEP_LIMIT: usize = 100_000;
/// Nested calls before a run is aborted
pub const DEFAULT_DEPTH_LIMIT: usize = 256;

/// One call performed during a run, in the order calls started.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// `Namespace.Type::Name` of the callee
    pub method: String,
    /// Arguments, the receiver first for instance methods
    pub arguments: Vec<EmValue>,
}

/// What the interpreter does after executing an instruction.
#[derive(Debug)]
enum StepResult {
    /// Continue with the next instruction
    Continue,
    /// Continue at the given instruction index
    Branch { target: usize },
    /// Leave the method
    Return { value: EmValue },
}

/// Activation record of one method.
struct Frame {
    arguments: Vec<EmValue>,
    locals: Vec<EmValue>,
    stack: Vec<EmValue>,
}

impl Frame {
    fn pop(&mut self, instruction: &Instruction) -> std::result::Result<EmValue, EmulationError> {
        self.stack
            .pop()
            .ok_or(EmulationError::StackUnderflow(instruction.mnemonic()))
    }

    fn pop_n(
        &mut self,
        count: usize,
        instruction: &Instruction,
    ) -> std::result::Result<Vec<EmValue>, EmulationError> {
        if self.stack.len() < count {
            return Err(EmulationError::StackUnderflow(instruction.mnemonic()));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn push(&mut self, value: EmValue) {
        self.stack.push(value);
    }
}

/// Executes the methods of a loaded module.
///
/// Methods defined by the module run instruction by instruction; calls to anything else go
/// to the [`NativeRegistry`]. By-reference arguments are passed as plain values, so `ldobj`
/// yields the value it is given. Exception handlers are not entered: `throw` ends the run
/// with [`EmulationError::Unhandled`] and `leave` branches without running `finally`
/// blocks.
///
/// # Examples
///
/// ```rust
/// use cilweave::{
///     emulation::{EmValue, Interpreter},
///     metadata::{typesystem::TypeRef, MethodBuilder, ModuleBuilder, TypeBuilder},
/// };
///
/// let module = ModuleBuilder::new("Library")
///     .add_type(TypeBuilder::new("Demo.Math").public().method(
///         MethodBuilder::new_static("Twice")
///             .public()
///             .param("value", TypeRef::int32())
///             .returns(TypeRef::int32())
///             .implementation(|asm| {
///                 asm.ldarg_0()?.ldarg_0()?.add()?.ret()?;
///                 Ok(())
///             }),
///     ))
///     .build()?;
///
/// let twice = module.find_type("Demo.Math")?.methods[0].reference();
/// let mut interpreter = Interpreter::new(&module)?;
/// assert_eq!(interpreter.invoke(&twice, vec![EmValue::I32(21)])?, EmValue::I32(42));
/// # Ok::<(), cilweave::Error>(())
/// ```
pub struct Interpreter<'a> {
    types: &'a [TypeDef],
    natives: NativeRegistry,
    step_limit: usize,
    depth_limit: usize,
    steps: usize,
    calls: Vec<CallRecord>,
}

impl<'a> Interpreter<'a> {
    /// An interpreter over `module` with the default natives.
    ///
    /// # Errors
    ///
    /// Propagates failures to load the module's types.
    pub fn new(module: &'a Module) -> Result<Self> {
        Ok(Interpreter {
            types: module.types()?,
            natives: NativeRegistry::default(),
            step_limit: DEFAULT_STEP_LIMIT,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            steps: 0,
            calls: Vec::new(),
        })
    }

    /// Replaces the native registry
    #[must_use]
    pub fn with_natives(mut self, natives: NativeRegistry) -> Self {
        self.natives = natives;
        self
    }

    /// Sets the number of instructions a single [`Interpreter::invoke`] may execute
    #[must_use]
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Sets how deep calls may nest
    #[must_use]
    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    /// Mutable access to the natives, to register additional ones
    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Every call started so far, including the calls passed to [`Interpreter::invoke`]
    #[must_use]
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Forgets the recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Calls `method` with `arguments` (the receiver first for instance methods) and returns
    /// its result, [`EmValue::Void`] for `void` methods.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Emulation`] if execution fails.
    pub fn invoke(&mut self, method: &MethodRef, arguments: Vec<EmValue>) -> Result<EmValue> {
        self.steps = 0;
        Ok(self.call(method, arguments, 0)?)
    }

    fn resolve(&self, method: &MethodRef) -> Option<&'a MethodDef> {
        let types: &'a [TypeDef] = self.types;
        types
            .iter()
            .find(|ty| ty.full_name() == method.declaring_type.full_name())?
            .methods
            .iter()
            .find(|candidate| {
                candidate.name == method.name
                    && candidate.has_this() == method.has_this
                    && candidate.params.len() == method.parameters.len()
                    && candidate
                        .params
                        .iter()
                        .zip(&method.parameters)
                        .all(|(param, ty)| param.ty.full_name() == ty.full_name())
            })
    }

    fn call(
        &mut self,
        method: &MethodRef,
        arguments: Vec<EmValue>,
        depth: usize,
    ) -> std::result::Result<EmValue, EmulationError> {
        if depth >= self.depth_limit {
            return Err(EmulationError::CallDepthExceeded(self.depth_limit));
        }
        self.calls.push(CallRecord {
            method: method.qualified_name(),
            arguments: arguments.clone(),
        });

        if let Some(definition) = self.resolve(method) {
            return self.execute(definition, arguments, depth);
        }
        match self.natives.get(method) {
            Some(native) => native(&arguments),
            None => Err(EmulationError::MethodNotFound(method.to_string())),
        }
    }

    fn execute(
        &mut self,
        method: &'a MethodDef,
        arguments: Vec<EmValue>,
        depth: usize,
    ) -> std::result::Result<EmValue, EmulationError> {
        let expected = method.params.len() + usize::from(method.has_this());
        if arguments.len() != expected {
            return Err(EmulationError::TypeMismatch {
                expected: "one value per argument slot",
                found: format!("{} argument(s) for {}", arguments.len(), method),
            });
        }

        let body = &method.body;
        let mut frame = Frame {
            arguments,
            locals: body
                .locals
                .iter()
                .map(|local| EmValue::default_for(&local.ty))
                .collect(),
            stack: Vec::with_capacity(usize::from(body.max_stack)),
        };

        let mut pc = 0;
        loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(EmulationError::StepLimitExceeded(self.step_limit));
            }

            let instruction =
                body.instructions
                    .get(pc)
                    .ok_or_else(|| EmulationError::InvalidTarget {
                        method: method.qualified_name(),
                        index: pc,
                    })?;

            match self.step(method, &mut frame, instruction, depth)? {
                StepResult::Continue => pc += 1,
                StepResult::Branch { target } => pc = target,
                StepResult::Return { value } => return Ok(value),
            }
        }
    }

    fn step(
        &mut self,
        method: &MethodDef,
        frame: &mut Frame,
        instruction: &Instruction,
        depth: usize,
    ) -> std::result::Result<StepResult, EmulationError> {
        match instruction.opcode {
            OpCode::Nop => {}

            OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Ldarg2
            | OpCode::Ldarg3
            | OpCode::LdargS
            | OpCode::Ldarg => {
                let slot = argument_slot(instruction)?;
                let value = frame
                    .arguments
                    .get(usize::from(slot))
                    .cloned()
                    .ok_or(EmulationError::InvalidArgument(slot))?;
                frame.push(value);
            }
            OpCode::StargS | OpCode::Starg => {
                let slot = argument_slot(instruction)?;
                let value = frame.pop(instruction)?;
                let target = frame
                    .arguments
                    .get_mut(usize::from(slot))
                    .ok_or(EmulationError::InvalidArgument(slot))?;
                *target = value;
            }
            OpCode::LdargaS | OpCode::Ldarga => return Err(EmulationError::Unsupported("ldarga")),

            OpCode::Ldloc0
            | OpCode::Ldloc1
            | OpCode::Ldloc2
            | OpCode::Ldloc3
            | OpCode::LdlocS
            | OpCode::Ldloc => {
                let index = local_index(instruction)?;
                let value = frame
                    .locals
                    .get(usize::from(index))
                    .cloned()
                    .ok_or(EmulationError::InvalidLocal(index))?;
                frame.push(value);
            }
            OpCode::Stloc0
            | OpCode::Stloc1
            | OpCode::Stloc2
            | OpCode::Stloc3
            | OpCode::StlocS
            | OpCode::Stloc => {
                let index = local_index(instruction)?;
                let value = frame.pop(instruction)?;
                let target = frame
                    .locals
                    .get_mut(usize::from(index))
                    .ok_or(EmulationError::InvalidLocal(index))?;
                *target = value;
            }
            OpCode::LdlocaS | OpCode::Ldloca => return Err(EmulationError::Unsupported("ldloca")),

            OpCode::Ldnull => frame.push(EmValue::Null),
            OpCode::LdcI4M1
            | OpCode::LdcI4_0
            | OpCode::LdcI4_1
            | OpCode::LdcI4_2
            | OpCode::LdcI4_3
            | OpCode::LdcI4_4
            | OpCode::LdcI4_5
            | OpCode::LdcI4_6
            | OpCode::LdcI4_7
            | OpCode::LdcI4_8
            | OpCode::LdcI4S
            | OpCode::LdcI4 => {
                let value = instruction
                    .int32_constant()
                    .ok_or(EmulationError::InvalidOperand(instruction.mnemonic()))?;
                frame.push(EmValue::I32(value));
            }
            OpCode::LdcI8 => match instruction.operand {
                Operand::Int64(value) => frame.push(EmValue::I64(value)),
                _ => return Err(EmulationError::InvalidOperand(instruction.mnemonic())),
            },
            OpCode::LdcR8 => match instruction.operand {
                Operand::Float64(value) => frame.push(EmValue::F64(value)),
                _ => return Err(EmulationError::InvalidOperand(instruction.mnemonic())),
            },
            OpCode::Ldstr => match &instruction.operand {
                Operand::String(value) => frame.push(EmValue::Str(value.clone())),
                _ => return Err(EmulationError::InvalidOperand(instruction.mnemonic())),
            },

            OpCode::Dup => {
                let value = frame.pop(instruction)?;
                frame.push(value.clone());
                frame.push(value);
            }
            OpCode::Pop => {
                frame.pop(instruction)?;
            }

            OpCode::Call | OpCode::Callvirt => {
                let callee = method_operand(instruction)?;
                let count = callee.parameters.len() + usize::from(callee.has_this);
                let arguments = frame.pop_n(count, instruction)?;
                if instruction.opcode == OpCode::Callvirt && arguments.first().is_some_and(EmValue::is_null) {
                    return Err(EmulationError::NullReference);
                }
                let result = self.call(callee, arguments, depth + 1)?;
                if !callee.return_type.is_void() {
                    frame.push(result);
                }
            }
            OpCode::Newobj => {
                let constructor = method_operand(instruction)?;
                let mut arguments = frame.pop_n(constructor.parameters.len(), instruction)?;
                let instance = EmValue::Object(constructor.declaring_type.full_name().to_string());
                arguments.insert(0, instance.clone());
                self.call(constructor, arguments, depth + 1)?;
                frame.push(instance);
            }
            OpCode::Ret => {
                let value = if method.returns_void() {
                    EmValue::Void
                } else {
                    frame.pop(instruction)?
                };
                return Ok(StepResult::Return { value });
            }

            OpCode::Br | OpCode::Leave => {
                return Ok(StepResult::Branch {
                    target: branch_target(instruction)?,
                })
            }
            OpCode::Brfalse | OpCode::Brtrue => {
                let value = frame.pop(instruction)?;
                if value.is_truthy() == (instruction.opcode == OpCode::Brtrue) {
                    return Ok(StepResult::Branch {
                        target: branch_target(instruction)?,
                    });
                }
            }
            OpCode::Beq
            | OpCode::BneUn
            | OpCode::Bge
            | OpCode::Bgt
            | OpCode::Ble
            | OpCode::Blt => {
                let right = frame.pop(instruction)?;
                let left = frame.pop(instruction)?;
                let taken = match instruction.opcode {
                    OpCode::Beq => values_equal(&left, &right),
                    OpCode::BneUn => !values_equal(&left, &right),
                    OpCode::Bge => compare(&left, &right)? != Ordering::Less,
                    OpCode::Bgt => compare(&left, &right)? == Ordering::Greater,
                    OpCode::Ble => compare(&left, &right)? != Ordering::Greater,
                    _ => compare(&left, &right)? == Ordering::Less,
                };
                if taken {
                    return Ok(StepResult::Branch {
                        target: branch_target(instruction)?,
                    });
                }
            }
            OpCode::Switch => {
                let Operand::Switch(targets) = &instruction.operand else {
                    return Err(EmulationError::InvalidOperand(instruction.mnemonic()));
                };
                let selector = frame.pop(instruction)?.as_i32()?;
                if let Some(target) = usize::try_from(selector)
                    .ok()
                    .and_then(|index| targets.get(index))
                {
                    return Ok(StepResult::Branch { target: *target });
                }
            }
            OpCode::Endfinally => return Err(EmulationError::Unsupported("endfinally")),
            OpCode::Throw => {
                let exception = frame.pop(instruction)?;
                return Err(EmulationError::Unhandled(exception.to_clr_string()));
            }
            OpCode::Rethrow => return Err(EmulationError::Unhandled("rethrow".to_string())),

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor => {
                let right = frame.pop(instruction)?;
                let left = frame.pop(instruction)?;
                frame.push(arithmetic(instruction.opcode, &left, &right)?);
            }
            OpCode::Neg => {
                let value = match frame.pop(instruction)? {
                    EmValue::I32(v) => EmValue::I32(v.wrapping_neg()),
                    EmValue::I64(v) => EmValue::I64(v.wrapping_neg()),
                    EmValue::F64(v) => EmValue::F64(-v),
                    other => return Err(other.mismatch("number")),
                };
                frame.push(value);
            }
            OpCode::Not => {
                let value = match frame.pop(instruction)? {
                    EmValue::I32(v) => EmValue::I32(!v),
                    EmValue::I64(v) => EmValue::I64(!v),
                    other => return Err(other.mismatch("integer")),
                };
                frame.push(value);
            }
            OpCode::Ceq | OpCode::Cgt | OpCode::Clt => {
                let right = frame.pop(instruction)?;
                let left = frame.pop(instruction)?;
                let result = match instruction.opcode {
                    OpCode::Ceq => values_equal(&left, &right),
                    OpCode::Cgt => compare(&left, &right)? == Ordering::Greater,
                    _ => compare(&left, &right)? == Ordering::Less,
                };
                frame.push(EmValue::I32(i32::from(result)));
            }
            OpCode::ConvI4 | OpCode::ConvI8 | OpCode::ConvR8 => {
                let value = frame.pop(instruction)?;
                frame.push(convert(instruction.opcode, &value)?);
            }

            OpCode::Box => {
                let ty = type_operand(instruction)?;
                let value = frame.pop(instruction)?;
                frame.push(if ty.is_value_type() {
                    EmValue::Boxed(Box::new(value))
                } else {
                    value
                });
            }
            OpCode::UnboxAny => {
                let ty = type_operand(instruction)?;
                let value = frame.pop(instruction)?;
                let unboxed = match value {
                    EmValue::Null if ty.is_value_type() => return Err(EmulationError::NullReference),
                    EmValue::Boxed(inner) if inner.is_instance_of(ty) => *inner,
                    other if !ty.is_value_type() && other.is_instance_of(ty) => other,
                    other => return Err(invalid_cast(&other, ty)),
                };
                frame.push(unboxed);
            }
            OpCode::Ldobj => {
                let value = frame.pop(instruction)?;
                frame.push(value);
            }
            OpCode::Castclass | OpCode::Isinst => {
                let ty = type_operand(instruction)?;
                let value = frame.pop(instruction)?;
                if value.is_instance_of(ty) {
                    frame.push(value);
                } else if instruction.opcode == OpCode::Isinst {
                    frame.push(EmValue::Null);
                } else {
                    return Err(invalid_cast(&value, ty));
                }
            }

            OpCode::Newarr => {
                let element = type_operand(instruction)?;
                let length = frame.pop(instruction)?.as_i32()?;
                let length = usize::try_from(length).map_err(|_| EmulationError::TypeMismatch {
                    expected: "non-negative array length",
                    found: length.to_string(),
                })?;
                frame.push(EmValue::array(vec![EmValue::default_for(element); length]));
            }
            OpCode::Ldlen => {
                let array = frame.pop(instruction)?;
                let length = array.as_array()?.borrow().len();
                frame.push(EmValue::I32(i32::try_from(length).unwrap_or(i32::MAX)));
            }
            OpCode::LdelemRef | OpCode::LdelemI4 => {
                let index = frame.pop(instruction)?.as_i32()?;
                let array = frame.pop(instruction)?;
                let elements = array.as_array()?.borrow();
                let value = element_index(index, elements.len())
                    .map(|index| elements[index].clone())?;
                frame.push(value);
            }
            OpCode::StelemRef | OpCode::StelemI4 => {
                let value = frame.pop(instruction)?;
                let index = frame.pop(instruction)?.as_i32()?;
                let array = frame.pop(instruction)?;
                let mut elements = array.as_array()?.borrow_mut();
                let index = element_index(index, elements.len())?;
                elements[index] = value;
            }
        }
        Ok(StepResult::Continue)
    }
}

fn argument_slot(instruction: &Instruction) -> std::result::Result<u16, EmulationError> {
    instruction
        .argument_slot()
        .ok_or(EmulationError::InvalidOperand(instruction.mnemonic()))
}

fn local_index(instruction: &Instruction) -> std::result::Result<u16, EmulationError> {
    instruction
        .local_index()
        .ok_or(EmulationError::InvalidOperand(instruction.mnemonic()))
}

fn branch_target(instruction: &Instruction) -> std::result::Result<usize, EmulationError> {
    match instruction.operand {
        Operand::Target(target) => Ok(target),
        _ => Err(EmulationError::InvalidOperand(instruction.mnemonic())),
    }
}

fn method_operand(instruction: &Instruction) -> std::result::Result<&MethodRef, EmulationError> {
    match &instruction.operand {
        Operand::Method(method) => Ok(method),
        _ => Err(EmulationError::InvalidOperand(instruction.mnemonic())),
    }
}

fn type_operand(instruction: &Instruction) -> std::result::Result<&TypeRef, EmulationError> {
    match &instruction.operand {
        Operand::Type(ty) => Ok(ty),
        _ => Err(EmulationError::InvalidOperand(instruction.mnemonic())),
    }
}

fn invalid_cast(value: &EmValue, target: &TypeRef) -> EmulationError {
    EmulationError::InvalidCast {
        found: value.kind().to_string(),
        target: target.full_name().to_string(),
    }
}

fn element_index(index: i32, length: usize) -> std::result::Result<usize, EmulationError> {
    usize::try_from(index)
        .ok()
        .filter(|index| *index < length)
        .ok_or(EmulationError::ArrayIndexOutOfBounds {
            index: i64::from(index),
            length,
        })
}

fn values_equal(left: &EmValue, right: &EmValue) -> bool {
    match (left, right) {
        (EmValue::Bool(l), r) | (r, EmValue::Bool(l)) => r.as_i32().is_ok_and(|r| r == i32::from(*l)),
        // Reference equality is approximated by value equality
        _ => left == right,
    }
}

fn compare(left: &EmValue, right: &EmValue) -> std::result::Result<Ordering, EmulationError> {
    match (left, right) {
        (EmValue::I32(l), EmValue::I32(r)) => Ok(l.cmp(r)),
        (EmValue::I64(l), EmValue::I64(r)) => Ok(l.cmp(r)),
        (EmValue::F64(l), EmValue::F64(r)) => l.partial_cmp(r).ok_or(EmulationError::TypeMismatch {
            expected: "ordered floats",
            found: "NaN".to_string(),
        }),
        (EmValue::I32(_) | EmValue::I64(_) | EmValue::F64(_), other) => {
            Err(other.mismatch(left.kind()))
        }
        (other, _) => Err(other.mismatch("number")),
    }
}

fn arithmetic(
    opcode: OpCode,
    left: &EmValue,
    right: &EmValue,
) -> std::result::Result<EmValue, EmulationError> {
    macro_rules! integer {
        ($l:expr, $r:expr, $variant:path) => {
            match opcode {
                OpCode::Add => $variant($l.wrapping_add($r)),
                OpCode::Sub => $variant($l.wrapping_sub($r)),
                OpCode::Mul => $variant($l.wrapping_mul($r)),
                OpCode::Div | OpCode::Rem if $r == 0 => return Err(EmulationError::DivisionByZero),
                OpCode::Div => $variant($l.wrapping_div($r)),
                OpCode::Rem => $variant($l.wrapping_rem($r)),
                OpCode::And => $variant($l & $r),
                OpCode::Or => $variant($l | $r),
                _ => $variant($l ^ $r),
            }
        };
    }

    Ok(match (left, right) {
        (EmValue::I32(l), EmValue::I32(r)) => integer!(*l, *r, EmValue::I32),
        (EmValue::I64(l), EmValue::I64(r)) => integer!(*l, *r, EmValue::I64),
        (EmValue::F64(l), EmValue::F64(r)) => match opcode {
            OpCode::Add => EmValue::F64(l + r),
            OpCode::Sub => EmValue::F64(l - r),
            OpCode::Mul => EmValue::F64(l * r),
            OpCode::Div => EmValue::F64(l / r),
            OpCode::Rem => EmValue::F64(l % r),
            _ => return Err(left.mismatch("integer")),
        },
        (EmValue::I32(_) | EmValue::I64(_) | EmValue::F64(_), other) => {
            return Err(other.mismatch(left.kind()))
        }
        (other, _) => return Err(other.mismatch("number")),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn convert(opcode: OpCode, value: &EmValue) -> std::result::Result<EmValue, EmulationError> {
    let (integer, float) = match value {
        EmValue::I32(v) => (i64::from(*v), f64::from(*v)),
        EmValue::Bool(v) => (i64::from(*v), f64::from(u8::from(*v))),
        #[allow(clippy::cast_precision_loss)]
        EmValue::I64(v) => (*v, *v as f64),
        EmValue::F64(v) => (*v as i64, *v),
        other => return Err(other.mismatch("number")),
    };
    Ok(match opcode {
        OpCode::ConvI4 => EmValue::I32(integer as i32),
        OpCode::ConvI8 => EmValue::I64(integer),
        _ => EmValue::F64(float),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        metadata::{MethodBuilder, ModuleBuilder, TypeBuilder},
        Error,
    };

    fn module_with(methods: Vec<MethodBuilder>) -> Module {
        let mut ty = TypeBuilder::new("Demo.Calc").public();
        for method in methods {
            ty = ty.method(method);
        }
        ModuleBuilder::new("Library").add_type(ty).build().unwrap()
    }

    fn method_ref(module: &Module, name: &str) -> MethodRef {
        module
            .find_type("Demo.Calc")
            .unwrap()
            .methods
            .iter()
            .find(|m| m.name == name)
            .unwrap()
            .reference()
    }

    fn run(module: &Module, name: &str, args: Vec<EmValue>) -> Result<EmValue> {
        Interpreter::new(module)?.invoke(&method_ref(module, name), args)
    }

    fn static_int(name: &str, body: impl FnOnce(&mut InstructionAssembler) -> Result<()> + 'static) -> MethodBuilder {
        MethodBuilder::new_static(name)
            .public()
            .param("value", TypeRef::int32())
            .returns(TypeRef::int32())
            .implementation(body)
    }

    #[test]
    fn loops_and_branches() {
        // sum of 1..=value
        let module = module_with(vec![MethodBuilder::new_static("Sum")
            .public()
            .param("value", TypeRef::int32())
            .returns(TypeRef::int32())
            .body(
                crate::metadata::MethodBodyBuilder::new()
                    .local(TypeRef::int32())
                    .implementation(|asm| {
                        asm.label("loop")?
                            .ldarg_0()?
                            .brfalse("done")?
                            .ldloc_0()?
                            .ldarg_0()?
                            .add()?
                            .stloc_0()?
                            .ldarg_0()?
                            .ldc_i4(1)?
                            .sub()?
                            .starg(0)?
                            .br("loop")?
                            .label("done")?
                            .ldloc_0()?
                            .ret()?;
                        Ok(())
                    }),
            )]);
        assert_eq!(run(&module, "Sum", vec![EmValue::I32(10)]).unwrap(), EmValue::I32(55));
    }

    #[test]
    fn nested_calls_are_recorded() {
        let double = MethodRef::new_static(
            TypeRef::class("Demo.Calc"),
            "Double",
            TypeRef::int32(),
            vec![TypeRef::int32()],
        );
        let module = module_with(vec![
            static_int("Double", |asm| {
                asm.ldarg_0()?.ldc_i4(2)?.mul()?.ret()?;
                Ok(())
            }),
            static_int("Quadruple", move |asm| {
                asm.ldarg_0()?.call(double.clone())?.call(double)?.ret()?;
                Ok(())
            }),
        ]);

        let mut interpreter = Interpreter::new(&module).unwrap();
        let result = interpreter
            .invoke(&method_ref(&module, "Quadruple"), vec![EmValue::I32(3)])
            .unwrap();
        assert_eq!(result, EmValue::I32(12));

        let calls: Vec<(&str, &[EmValue])> = interpreter
            .calls()
            .iter()
            .map(|call| (call.method.as_str(), call.arguments.as_slice()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("Demo.Calc::Quadruple", &[EmValue::I32(3)][..]),
                ("Demo.Calc::Double", &[EmValue::I32(3)][..]),
                ("Demo.Calc::Double", &[EmValue::I32(6)][..]),
            ]
        );
    }

    #[test]
    fn arrays_and_boxing() {
        let module = module_with(vec![MethodBuilder::new_static("Pack")
            .public()
            .param("value", TypeRef::int32())
            .returns(TypeRef::array(TypeRef::object()))
            .implementation(|asm| {
                asm.ldc_i4(2)?
                    .newarr(TypeRef::object())?
                    .dup()?
                    .ldc_i4(1)?
                    .ldarg_0()?
                    .box_value(TypeRef::int32())?
                    .stelem_ref()?
                    .ret()?;
                Ok(())
            })]);
        assert_eq!(
            run(&module, "Pack", vec![EmValue::I32(7)]).unwrap(),
            EmValue::array(vec![EmValue::Null, EmValue::boxed(7)])
        );
    }

    #[test]
    fn natives_and_constructors() {
        let concat = MethodRef::new_static(
            TypeRef::string(),
            "Concat",
            TypeRef::string(),
            vec![TypeRef::string(), TypeRef::string()],
        );
        let ctor = MethodRef::new_instance(TypeRef::class("Demo.Calc"), ".ctor", TypeRef::void(), vec![]);
        let object_ctor = MethodRef::new_instance(TypeRef::object(), ".ctor", TypeRef::void(), vec![]);
        let module = module_with(vec![
            MethodBuilder::constructor().implementation(move |asm| {
                asm.ldarg_0()?.call(object_ctor)?.ret()?;
                Ok(())
            }),
            MethodBuilder::new_static("Greet")
                .public()
                .param("name", TypeRef::string())
                .returns(TypeRef::string())
                .implementation(move |asm| {
                    asm.newobj(ctor)?.pop()?.ldstr("Hello ")?.ldarg_0()?.call(concat)?.ret()?;
                    Ok(())
                }),
        ]);
        assert_eq!(
            run(&module, "Greet", vec!["Jeff".into()]).unwrap(),
            EmValue::from("Hello Jeff")
        );
    }

    #[test]
    fn failures() {
        let missing = MethodRef::new_static(TypeRef::class("Demo.Nowhere"), "Gone", TypeRef::void(), vec![]);
        let module = module_with(vec![
            static_int("Underflow", |asm| {
                asm.add()?.ret()?;
                Ok(())
            }),
            static_int("Forever", |asm| {
                asm.label("top")?.br("top")?;
                Ok(())
            }),
            static_int("Divide", |asm| {
                asm.ldarg_0()?.ldc_i4(0)?.div()?.ret()?;
                Ok(())
            }),
            static_int("FallOff", |asm| {
                asm.nop()?;
                Ok(())
            }),
            static_int("Missing", move |asm| {
                asm.call(missing)?.ldc_i4(0)?.ret()?;
                Ok(())
            }),
            static_int("Throws", |asm| {
                asm.ldstr("boom")?.throw()?;
                Ok(())
            }),
        ]);

        let failure = |name: &str| match run(&module, name, vec![EmValue::I32(1)]) {
            Err(Error::Emulation(error)) => error,
            other => panic!("{name}: expected an emulation error, got {other:?}"),
        };
        assert_eq!(failure("Underflow"), EmulationError::StackUnderflow("add"));
        assert_eq!(failure("Forever"), EmulationError::StepLimitExceeded(DEFAULT_STEP_LIMIT));
        assert_eq!(failure("Divide"), EmulationError::DivisionByZero);
        assert!(matches!(failure("FallOff"), EmulationError::InvalidTarget { index: 1, .. }));
        assert!(matches!(failure("Missing"), EmulationError::MethodNotFound(_)));
        assert_eq!(failure("Throws"), EmulationError::Unhandled("boom".to_string()));
    }

    #[test]
    fn recursion_is_bounded() {
        let itself = MethodRef::new_static(
            TypeRef::class("Demo.Calc"),
            "Recurse",
            TypeRef::int32(),
            vec![TypeRef::int32()],
        );
        let module = module_with(vec![static_int("Recurse", move |asm| {
            asm.ldarg_0()?.call(itself)?.ret()?;
            Ok(())
        })]);
        let mut interpreter = Interpreter::new(&module).unwrap().with_depth_limit(8);
        assert!(matches!(
            interpreter.invoke(&method_ref(&module, "Recurse"), vec![EmValue::I32(0)]),
            Err(Error::Emulation(EmulationError::CallDepthExceeded(8)))
        ));
    }

    #[test]
    fn argument_count_is_checked() {
        let module = module_with(vec![static_int("Id", |asm| {
            asm.ldarg_0()?.ret()?;
            Ok(())
        })]);
        assert!(run(&module, "Id", vec![]).is_err());
    }
}
