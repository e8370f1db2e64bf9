//! CIL instruction representation used by method bodies and the weaver.
//!
//! Instructions are a closed tagged union: an [`OpCode`] drawn from a finite set plus an
//! [`Operand`]. Branch targets are instruction indices rather than byte offsets, so a body
//! can be spliced and relocated without re-encoding. Every transform in
//! [`crate::weaving`] is an exhaustive `match` over [`OpCode`].
//!
//! # Key Components
//!
//! - [`Instruction`] - One instruction: opcode and operand
//! - [`OpCode`] - The supported opcodes, with their textual mnemonics
//! - [`Operand`] - Immediates, slots, branch targets, and metadata references
//! - [`FlowType`] - How an instruction affects control flow
//! - [`ArgumentAccess`] - How an instruction touches an argument slot
//!
//! # Examples
//!
//! ```rust
//! use cilweave::assembly::{Instruction, OpCode, Operand};
//!
//! // Argument loads pick the most compact encoding
//! assert_eq!(Instruction::ldarg(2).opcode, OpCode::Ldarg2);
//! assert_eq!(Instruction::ldarg(7), Instruction::new(OpCode::LdargS, Operand::Argument(7)));
//! assert_eq!(Instruction::ldarg(7).argument_slot(), Some(7));
//! assert_eq!(OpCode::LdargS.mnemonic(), "ldarg.s");
//! ```

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

use crate::metadata::{method::MethodRef, typesystem::TypeRef};

/// The opcodes understood by this crate.
///
/// The set covers everything the weaver synthesizes and the instructions commonly found in
/// proxy bodies. Mnemonics follow ECMA-335 Partition III.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
pub enum OpCode {
    /// Do nothing
    #[strum(serialize = "nop")]
    Nop,
    /// Load argument 0
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    /// Load argument 1
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    /// Load argument 2
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    /// Load argument 3
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    /// Load argument, short index
    #[strum(serialize = "ldarg.s")]
    LdargS,
    /// Load argument
    #[strum(serialize = "ldarg")]
    Ldarg,
    /// Load argument address, short index
    #[strum(serialize = "ldarga.s")]
    LdargaS,
    /// Load argument address
    #[strum(serialize = "ldarga")]
    Ldarga,
    /// Store argument, short index
    #[strum(serialize = "starg.s")]
    StargS,
    /// Store argument
    #[strum(serialize = "starg")]
    Starg,
    /// Load local 0
    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    /// Load local 1
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    /// Load local 2
    #[strum(serialize = "ldloc.2")]
    Ldloc2,
    /// Load local 3
    #[strum(serialize = "ldloc.3")]
    Ldloc3,
    /// Load local, short index
    #[strum(serialize = "ldloc.s")]
    LdlocS,
    /// Load local
    #[strum(serialize = "ldloc")]
    Ldloc,
    /// Load local address, short index
    #[strum(serialize = "ldloca.s")]
    LdlocaS,
    /// Load local address
    #[strum(serialize = "ldloca")]
    Ldloca,
    /// Store local 0
    #[strum(serialize = "stloc.0")]
    Stloc0,
    /// Store local 1
    #[strum(serialize = "stloc.1")]
    Stloc1,
    /// Store local 2
    #[strum(serialize = "stloc.2")]
    Stloc2,
    /// Store local 3
    #[strum(serialize = "stloc.3")]
    Stloc3,
    /// Store local, short index
    #[strum(serialize = "stloc.s")]
    StlocS,
    /// Store local
    #[strum(serialize = "stloc")]
    Stloc,
    /// Push null
    #[strum(serialize = "ldnull")]
    Ldnull,
    /// Push -1
    #[strum(serialize = "ldc.i4.m1")]
    LdcI4M1,
    /// Push 0
    #[strum(serialize = "ldc.i4.0")]
    LdcI4_0,
    /// Push 1
    #[strum(serialize = "ldc.i4.1")]
    LdcI4_1,
    /// Push 2
    #[strum(serialize = "ldc.i4.2")]
    LdcI4_2,
    /// Push 3
    #[strum(serialize = "ldc.i4.3")]
    LdcI4_3,
    /// Push 4
    #[strum(serialize = "ldc.i4.4")]
    LdcI4_4,
    /// Push 5
    #[strum(serialize = "ldc.i4.5")]
    LdcI4_5,
    /// Push 6
    #[strum(serialize = "ldc.i4.6")]
    LdcI4_6,
    /// Push 7
    #[strum(serialize = "ldc.i4.7")]
    LdcI4_7,
    /// Push 8
    #[strum(serialize = "ldc.i4.8")]
    LdcI4_8,
    /// Push an `int32` in the `int8` range
    #[strum(serialize = "ldc.i4.s")]
    LdcI4S,
    /// Push an `int32`
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    /// Push an `int64`
    #[strum(serialize = "ldc.i8")]
    LdcI8,
    /// Push a `float64`
    #[strum(serialize = "ldc.r8")]
    LdcR8,
    /// Push a string literal
    #[strum(serialize = "ldstr")]
    Ldstr,
    /// Duplicate the top of the stack
    #[strum(serialize = "dup")]
    Dup,
    /// Discard the top of the stack
    #[strum(serialize = "pop")]
    Pop,
    /// Call a method
    #[strum(serialize = "call")]
    Call,
    /// Call a method through its receiver
    #[strum(serialize = "callvirt")]
    Callvirt,
    /// Allocate an object and call its constructor
    #[strum(serialize = "newobj")]
    Newobj,
    /// Return from the method
    #[strum(serialize = "ret")]
    Ret,
    /// Unconditional branch
    #[strum(serialize = "br")]
    Br,
    /// Branch if zero, null or false
    #[strum(serialize = "brfalse")]
    Brfalse,
    /// Branch if non-zero, non-null or true
    #[strum(serialize = "brtrue")]
    Brtrue,
    /// Branch if equal
    #[strum(serialize = "beq")]
    Beq,
    /// Branch if not equal
    #[strum(serialize = "bne.un")]
    BneUn,
    /// Branch if greater or equal
    #[strum(serialize = "bge")]
    Bge,
    /// Branch if greater
    #[strum(serialize = "bgt")]
    Bgt,
    /// Branch if less or equal
    #[strum(serialize = "ble")]
    Ble,
    /// Branch if less
    #[strum(serialize = "blt")]
    Blt,
    /// Jump table
    #[strum(serialize = "switch")]
    Switch,
    /// Exit a protected region
    #[strum(serialize = "leave")]
    Leave,
    /// End a finally or fault handler
    #[strum(serialize = "endfinally")]
    Endfinally,
    /// Throw the exception on top of the stack
    #[strum(serialize = "throw")]
    Throw,
    /// Rethrow the current exception
    #[strum(serialize = "rethrow")]
    Rethrow,
    /// Add
    #[strum(serialize = "add")]
    Add,
    /// Subtract
    #[strum(serialize = "sub")]
    Sub,
    /// Multiply
    #[strum(serialize = "mul")]
    Mul,
    /// Divide
    #[strum(serialize = "div")]
    Div,
    /// Remainder
    #[strum(serialize = "rem")]
    Rem,
    /// Negate
    #[strum(serialize = "neg")]
    Neg,
    /// Bitwise and
    #[strum(serialize = "and")]
    And,
    /// Bitwise or
    #[strum(serialize = "or")]
    Or,
    /// Bitwise xor
    #[strum(serialize = "xor")]
    Xor,
    /// Bitwise complement
    #[strum(serialize = "not")]
    Not,
    /// Compare equal
    #[strum(serialize = "ceq")]
    Ceq,
    /// Compare greater
    #[strum(serialize = "cgt")]
    Cgt,
    /// Compare less
    #[strum(serialize = "clt")]
    Clt,
    /// Convert to `int32`
    #[strum(serialize = "conv.i4")]
    ConvI4,
    /// Convert to `int64`
    #[strum(serialize = "conv.i8")]
    ConvI8,
    /// Convert to `float64`
    #[strum(serialize = "conv.r8")]
    ConvR8,
    /// Box a value type
    #[strum(serialize = "box")]
    Box,
    /// Unbox to a value
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    /// Load a value through an address
    #[strum(serialize = "ldobj")]
    Ldobj,
    /// Cast, throwing on failure
    #[strum(serialize = "castclass")]
    Castclass,
    /// Cast, yielding null on failure
    #[strum(serialize = "isinst")]
    Isinst,
    /// Allocate a zero-based, single-dimensional array
    #[strum(serialize = "newarr")]
    Newarr,
    /// Push an array's length
    #[strum(serialize = "ldlen")]
    Ldlen,
    /// Load an object reference element
    #[strum(serialize = "ldelem.ref")]
    LdelemRef,
    /// Store an object reference element
    #[strum(serialize = "stelem.ref")]
    StelemRef,
    /// Load an `int32` element
    #[strum(serialize = "ldelem.i4")]
    LdelemI4,
    /// Store an `int32` element
    #[strum(serialize = "stelem.i4")]
    StelemI4,
}

/// The kind of operand an opcode carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 64-bit floating point
    Float64,
    /// String literal
    String,
    /// Argument slot
    Argument,
    /// Local slot
    Local,
    /// Instruction index
    Target,
    /// Jump table of instruction indices
    Switch,
    /// Type reference
    Type,
    /// Method reference
    Method,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally block
    EndFinally,
    /// Leave protected region
    Leave,
}

/// How an instruction touches an argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentAccess {
    /// `ldarg.*`
    Load,
    /// `ldarga.*`
    LoadAddress,
    /// `starg.*`
    Store,
}

impl OpCode {
    /// The textual mnemonic, e.g. `ldarg.s`
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// The kind of operand this opcode expects
    #[must_use]
    pub fn operand_type(self) -> OperandType {
        match self {
            OpCode::LdargS
            | OpCode::Ldarg
            | OpCode::LdargaS
            | OpCode::Ldarga
            | OpCode::StargS
            | OpCode::Starg => OperandType::Argument,
            OpCode::LdlocS
            | OpCode::Ldloc
            | OpCode::LdlocaS
            | OpCode::Ldloca
            | OpCode::StlocS
            | OpCode::Stloc => OperandType::Local,
            OpCode::LdcI4S | OpCode::LdcI4 => OperandType::Int32,
            OpCode::LdcI8 => OperandType::Int64,
            OpCode::LdcR8 => OperandType::Float64,
            OpCode::Ldstr => OperandType::String,
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => OperandType::Method,
            OpCode::Br
            | OpCode::Brfalse
            | OpCode::Brtrue
            | OpCode::Beq
            | OpCode::BneUn
            | OpCode::Bge
            | OpCode::Bgt
            | OpCode::Ble
            | OpCode::Blt
            | OpCode::Leave => OperandType::Target,
            OpCode::Switch => OperandType::Switch,
            OpCode::Box
            | OpCode::UnboxAny
            | OpCode::Ldobj
            | OpCode::Castclass
            | OpCode::Isinst
            | OpCode::Newarr => OperandType::Type,
            OpCode::Nop
            | OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Ldarg2
            | OpCode::Ldarg3
            | OpCode::Ldloc0
            | OpCode::Ldloc1
            | OpCode::Ldloc2
            | OpCode::Ldloc3
            | OpCode::Stloc0
            | OpCode::Stloc1
            | OpCode::Stloc2
            | OpCode::Stloc3
            | OpCode::Ldnull
            | OpCode::LdcI4M1
            | OpCode::LdcI4_0
            | OpCode::LdcI4_1
            | OpCode::LdcI4_2
            | OpCode::LdcI4_3
            | OpCode::LdcI4_4
            | OpCode::LdcI4_5
            | OpCode::LdcI4_6
            | OpCode::LdcI4_7
            | OpCode::LdcI4_8
            | OpCode::Dup
            | OpCode::Pop
            | OpCode::Ret
            | OpCode::Endfinally
            | OpCode::Throw
            | OpCode::Rethrow
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Neg
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor
            | OpCode::Not
            | OpCode::Ceq
            | OpCode::Cgt
            | OpCode::Clt
            | OpCode::ConvI4
            | OpCode::ConvI8
            | OpCode::ConvR8
            | OpCode::Ldlen
            | OpCode::LdelemRef
            | OpCode::StelemRef
            | OpCode::LdelemI4
            | OpCode::StelemI4 => OperandType::None,
        }
    }

    /// How this opcode affects control flow
    #[must_use]
    pub fn flow_type(self) -> FlowType {
        match self {
            OpCode::Br => FlowType::UnconditionalBranch,
            OpCode::Brfalse
            | OpCode::Brtrue
            | OpCode::Beq
            | OpCode::BneUn
            | OpCode::Bge
            | OpCode::Bgt
            | OpCode::Ble
            | OpCode::Blt => FlowType::ConditionalBranch,
            OpCode::Switch => FlowType::Switch,
            OpCode::Leave => FlowType::Leave,
            OpCode::Endfinally => FlowType::EndFinally,
            OpCode::Throw | OpCode::Rethrow => FlowType::Throw,
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => FlowType::Call,
            OpCode::Ret => FlowType::Return,
            _ => FlowType::Sequential,
        }
    }

    /// How this opcode touches an argument slot, if it does
    #[must_use]
    pub fn argument_access(self) -> Option<ArgumentAccess> {
        match self {
            OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Ldarg2
            | OpCode::Ldarg3
            | OpCode::LdargS
            | OpCode::Ldarg => Some(ArgumentAccess::Load),
            OpCode::LdargaS | OpCode::Ldarga => Some(ArgumentAccess::LoadAddress),
            OpCode::StargS | OpCode::Starg => Some(ArgumentAccess::Store),
            _ => None,
        }
    }

    /// The slot encoded in the opcode itself, for the compact fixed-slot forms
    #[must_use]
    pub fn implied_slot(self) -> Option<u16> {
        match self {
            OpCode::Ldarg0 | OpCode::Ldloc0 | OpCode::Stloc0 => Some(0),
            OpCode::Ldarg1 | OpCode::Ldloc1 | OpCode::Stloc1 => Some(1),
            OpCode::Ldarg2 | OpCode::Ldloc2 | OpCode::Stloc2 => Some(2),
            OpCode::Ldarg3 | OpCode::Ldloc3 | OpCode::Stloc3 => Some(3),
            _ => None,
        }
    }

    /// The constant pushed by the compact `ldc.i4.*` forms
    #[must_use]
    pub fn implied_int32(self) -> Option<i32> {
        match self {
            OpCode::LdcI4M1 => Some(-1),
            OpCode::LdcI4_0 => Some(0),
            OpCode::LdcI4_1 => Some(1),
            OpCode::LdcI4_2 => Some(2),
            OpCode::LdcI4_3 => Some(3),
            OpCode::LdcI4_4 => Some(4),
            OpCode::LdcI4_5 => Some(5),
            OpCode::LdcI4_6 => Some(6),
            OpCode::LdcI4_7 => Some(7),
            OpCode::LdcI4_8 => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// 32-bit integer literal
    Int32(i32),
    /// 64-bit integer literal
    Int64(i64),
    /// 64-bit floating point literal
    Float64(f64),
    /// String literal
    String(String),
    /// Argument slot index
    Argument(u16),
    /// Local slot index
    Local(u16),
    /// Branch target, as an index into the instruction list
    Target(usize),
    /// Jump table, as indices into the instruction list
    Switch(Vec<usize>),
    /// Type reference
    Type(TypeRef),
    /// Method reference
    Method(MethodRef),
}

impl Operand {
    /// The kind of this operand
    #[must_use]
    pub fn operand_type(&self) -> OperandType {
        match self {
            Operand::None => OperandType::None,
            Operand::Int32(_) => OperandType::Int32,
            Operand::Int64(_) => OperandType::Int64,
            Operand::Float64(_) => OperandType::Float64,
            Operand::String(_) => OperandType::String,
            Operand::Argument(_) => OperandType::Argument,
            Operand::Local(_) => OperandType::Local,
            Operand::Target(_) => OperandType::Target,
            Operand::Switch(_) => OperandType::Switch,
            Operand::Type(_) => OperandType::Type,
            Operand::Method(_) => OperandType::Method,
        }
    }
}

/// A single instruction of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand; [`Operand::None`] for opcodes without one
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction from its parts
    #[must_use]
    pub fn new(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// Creates an instruction without operand
    #[must_use]
    pub fn simple(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Loads argument `slot`, using the most compact form
    #[must_use]
    pub fn ldarg(slot: u16) -> Self {
        Self::argument(ArgumentAccess::Load, slot)
    }

    /// Builds an argument access of the given kind, using the most compact form
    #[must_use]
    pub fn argument(access: ArgumentAccess, slot: u16) -> Self {
        match (access, slot) {
            (ArgumentAccess::Load, 0) => Self::simple(OpCode::Ldarg0),
            (ArgumentAccess::Load, 1) => Self::simple(OpCode::Ldarg1),
            (ArgumentAccess::Load, 2) => Self::simple(OpCode::Ldarg2),
            (ArgumentAccess::Load, 3) => Self::simple(OpCode::Ldarg3),
            (ArgumentAccess::Load, 4..=255) => Self::new(OpCode::LdargS, Operand::Argument(slot)),
            (ArgumentAccess::Load, _) => Self::new(OpCode::Ldarg, Operand::Argument(slot)),
            (ArgumentAccess::LoadAddress, 0..=255) => {
                Self::new(OpCode::LdargaS, Operand::Argument(slot))
            }
            (ArgumentAccess::LoadAddress, _) => Self::new(OpCode::Ldarga, Operand::Argument(slot)),
            (ArgumentAccess::Store, 0..=255) => Self::new(OpCode::StargS, Operand::Argument(slot)),
            (ArgumentAccess::Store, _) => Self::new(OpCode::Starg, Operand::Argument(slot)),
        }
    }

    /// Loads local `index`, using the most compact form
    #[must_use]
    pub fn ldloc(index: u16) -> Self {
        match index {
            0 => Self::simple(OpCode::Ldloc0),
            1 => Self::simple(OpCode::Ldloc1),
            2 => Self::simple(OpCode::Ldloc2),
            3 => Self::simple(OpCode::Ldloc3),
            4..=255 => Self::new(OpCode::LdlocS, Operand::Local(index)),
            _ => Self::new(OpCode::Ldloc, Operand::Local(index)),
        }
    }

    /// Stores into local `index`, using the most compact form
    #[must_use]
    pub fn stloc(index: u16) -> Self {
        match index {
            0 => Self::simple(OpCode::Stloc0),
            1 => Self::simple(OpCode::Stloc1),
            2 => Self::simple(OpCode::Stloc2),
            3 => Self::simple(OpCode::Stloc3),
            4..=255 => Self::new(OpCode::StlocS, Operand::Local(index)),
            _ => Self::new(OpCode::Stloc, Operand::Local(index)),
        }
    }

    /// Pushes an `int32` constant, using the most compact form
    #[must_use]
    pub fn ldc_i4(value: i32) -> Self {
        match value {
            -1 => Self::simple(OpCode::LdcI4M1),
            0 => Self::simple(OpCode::LdcI4_0),
            1 => Self::simple(OpCode::LdcI4_1),
            2 => Self::simple(OpCode::LdcI4_2),
            3 => Self::simple(OpCode::LdcI4_3),
            4 => Self::simple(OpCode::LdcI4_4),
            5 => Self::simple(OpCode::LdcI4_5),
            6 => Self::simple(OpCode::LdcI4_6),
            7 => Self::simple(OpCode::LdcI4_7),
            8 => Self::simple(OpCode::LdcI4_8),
            -128..=127 => Self::new(OpCode::LdcI4S, Operand::Int32(value)),
            _ => Self::new(OpCode::LdcI4, Operand::Int32(value)),
        }
    }

    /// Pushes a string literal
    #[must_use]
    pub fn ldstr(value: &str) -> Self {
        Self::new(OpCode::Ldstr, Operand::String(value.to_string()))
    }

    /// Calls `method`
    #[must_use]
    pub fn call(method: MethodRef) -> Self {
        Self::new(OpCode::Call, Operand::Method(method))
    }

    /// An instruction taking a type operand (`box`, `newarr`, ...)
    #[must_use]
    pub fn with_type(opcode: OpCode, ty: TypeRef) -> Self {
        Self::new(opcode, Operand::Type(ty))
    }

    /// The textual mnemonic
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    /// The argument slot this instruction refers to, for `ldarg*`, `ldarga*` and `starg*`
    #[must_use]
    pub fn argument_slot(&self) -> Option<u16> {
        self.opcode.argument_access()?;
        match (self.opcode.implied_slot(), &self.operand) {
            (Some(slot), _) => Some(slot),
            (None, Operand::Argument(slot)) => Some(*slot),
            _ => None,
        }
    }

    /// The local slot this instruction refers to, for `ldloc*`, `ldloca*` and `stloc*`
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match self.opcode {
            OpCode::Ldloc0
            | OpCode::Ldloc1
            | OpCode::Ldloc2
            | OpCode::Ldloc3
            | OpCode::Stloc0
            | OpCode::Stloc1
            | OpCode::Stloc2
            | OpCode::Stloc3 => self.opcode.implied_slot(),
            _ => match &self.operand {
                Operand::Local(index) => Some(*index),
                _ => None,
            },
        }
    }

    /// The `int32` constant pushed by this instruction, if it is an `ldc.i4*`
    #[must_use]
    pub fn int32_constant(&self) -> Option<i32> {
        match (self.opcode, &self.operand) {
            (OpCode::LdcI4S | OpCode::LdcI4, Operand::Int32(value)) => Some(*value),
            (opcode, _) => opcode.implied_int32(),
        }
    }

    /// Returns true if the operand has the kind the opcode expects
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.opcode.operand_type() == self.operand.operand_type()
    }

    /// The instruction indices this instruction may transfer control to
    #[must_use]
    pub fn targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every instruction index held by this instruction through `map`
    pub fn relocate<F: Fn(usize) -> usize>(&mut self, map: &F) {
        match &mut self.operand {
            Operand::Target(target) => *target = map(*target),
            Operand::Switch(targets) => {
                for target in targets.iter_mut() {
                    *target = map(*target);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int32(value) => write!(f, " {value}"),
            Operand::Int64(value) => write!(f, " {value}"),
            Operand::Float64(value) => write!(f, " {value}"),
            Operand::String(value) => write!(f, " {value:?}"),
            Operand::Argument(slot) => write!(f, " A_{slot}"),
            Operand::Local(index) => write!(f, " V_{index}"),
            Operand::Target(target) => write!(f, " IL_{target:04}"),
            Operand::Switch(targets) => {
                let labels: Vec<String> = targets.iter().map(|t| format!("IL_{t:04}")).collect();
                write!(f, " ({})", labels.join(", "))
            }
            Operand::Type(ty) => write!(f, " {ty}"),
            Operand::Method(method) => write!(f, " {method}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn compact_argument_forms() {
        for slot in 0..4u16 {
            let instruction = Instruction::ldarg(slot);
            assert_eq!(instruction.operand, Operand::None);
            assert_eq!(instruction.argument_slot(), Some(slot));
        }
        assert_eq!(Instruction::ldarg(4).opcode, OpCode::LdargS);
        assert_eq!(Instruction::ldarg(255).opcode, OpCode::LdargS);
        assert_eq!(Instruction::ldarg(256).opcode, OpCode::Ldarg);
        assert_eq!(Instruction::ldarg(256).argument_slot(), Some(256));
    }

    #[test]
    fn argument_store_and_address() {
        let store = Instruction::argument(ArgumentAccess::Store, 1);
        assert_eq!(store.opcode, OpCode::StargS);
        assert_eq!(store.argument_slot(), Some(1));

        let address = Instruction::argument(ArgumentAccess::LoadAddress, 300);
        assert_eq!(address.opcode, OpCode::Ldarga);
        assert_eq!(address.argument_slot(), Some(300));
    }

    #[test]
    fn locals_are_not_arguments() {
        assert_eq!(Instruction::ldloc(0).argument_slot(), None);
        assert_eq!(Instruction::ldloc(0).local_index(), Some(0));
        assert_eq!(Instruction::stloc(9).local_index(), Some(9));
        assert_eq!(Instruction::ldc_i4(2).argument_slot(), None);
    }

    #[test]
    fn int32_constants() {
        for value in [-1, 0, 5, 8, 9, -128, 127, 128, 70_000] {
            assert_eq!(Instruction::ldc_i4(value).int32_constant(), Some(value));
        }
        assert_eq!(Instruction::ldc_i4(8).opcode, OpCode::LdcI4_8);
        assert_eq!(Instruction::ldc_i4(100).opcode, OpCode::LdcI4S);
        assert_eq!(Instruction::ldc_i4(1000).opcode, OpCode::LdcI4);
    }

    #[test]
    fn constructors_are_well_formed() {
        assert!(Instruction::ldarg(300).is_well_formed());
        assert!(Instruction::ldloc(12).is_well_formed());
        assert!(Instruction::ldc_i4(-70).is_well_formed());
        assert!(Instruction::ldstr("x").is_well_formed());
        assert!(Instruction::with_type(OpCode::Box, TypeRef::int32()).is_well_formed());
        assert!(!Instruction::simple(OpCode::Br).is_well_formed());
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for opcode in OpCode::iter() {
            assert!(seen.insert(opcode.mnemonic()), "{opcode:?}");
        }
    }

    #[test]
    fn relocate_targets() {
        let mut branch = Instruction::new(OpCode::Br, Operand::Target(3));
        branch.relocate(&|i| i + 10);
        assert_eq!(branch.operand, Operand::Target(13));

        let mut switch = Instruction::new(OpCode::Switch, Operand::Switch(vec![0, 2]));
        switch.relocate(&|i| i * 2);
        assert_eq!(switch.operand, Operand::Switch(vec![0, 4]));

        let mut load = Instruction::ldarg(2);
        load.relocate(&|i| i + 1);
        assert_eq!(load, Instruction::ldarg(2));
    }

    #[test]
    fn display() {
        assert_eq!(Instruction::ldarg(5).to_string(), "ldarg.s A_5");
        assert_eq!(Instruction::ldstr("hi").to_string(), "ldstr \"hi\"");
        assert_eq!(
            Instruction::new(OpCode::Brtrue, Operand::Target(7)).to_string(),
            "brtrue IL_0007"
        );
    }
}
