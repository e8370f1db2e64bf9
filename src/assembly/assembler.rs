//! Fluent construction of instruction lists with symbolic labels.
//!
//! [`InstructionAssembler`] appends one instruction per call and returns `&mut Self`, so
//! bodies read like IL listings. Branches name a label instead of an index; labels may be
//! defined before or after the branches that use them and are resolved by
//! [`InstructionAssembler::finish`].
//!
//! # Examples
//!
//! ```rust
//! use cilweave::assembly::{InstructionAssembler, OpCode, Operand};
//!
//! let mut asm = InstructionAssembler::new();
//! asm.ldarg_0()?
//!     .brtrue("positive")?
//!     .ldc_i4(-1)?
//!     .ret()?
//!     .label("positive")?
//!     .ldc_i4(1)?
//!     .ret()?;
//!
//! let instructions = asm.finish()?;
//! assert_eq!(instructions[1].operand, Operand::Target(4));
//! assert_eq!(instructions[2].opcode, OpCode::LdcI4M1);
//! # Ok::<(), cilweave::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::instruction::{ArgumentAccess, FlowType, Instruction, OpCode, Operand},
    metadata::{method::MethodRef, typesystem::TypeRef},
    Result,
};

/// A branch whose target labels are resolved when the assembler finishes
struct LabelFixup {
    instruction: usize,
    labels: Vec<String>,
}

macro_rules! simple_instructions {
    ($($(#[$doc:meta])* $name:ident => $opcode:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self) -> Result<&mut Self> {
                self.emit(Instruction::simple(OpCode::$opcode))
            }
        )*
    };
}

macro_rules! branch_instructions {
    ($($(#[$doc:meta])* $name:ident => $opcode:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, label: &str) -> Result<&mut Self> {
                self.branch(OpCode::$opcode, label)
            }
        )*
    };
}

macro_rules! type_instructions {
    ($($(#[$doc:meta])* $name:ident => $opcode:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, ty: TypeRef) -> Result<&mut Self> {
                self.emit(Instruction::with_type(OpCode::$opcode, ty))
            }
        )*
    };
}

/// Builds a list of [`Instruction`]s.
#[derive(Default)]
pub struct InstructionAssembler {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    fixups: Vec<LabelFixup>,
}

impl InstructionAssembler {
    /// Creates an empty assembler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next instruction will get
    #[must_use]
    pub fn position(&self) -> usize {
        self.instructions.len()
    }

    /// Appends a prebuilt instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the operand does not fit the opcode.
    pub fn emit(&mut self, instruction: Instruction) -> Result<&mut Self> {
        if !instruction.is_well_formed() {
            return Err(malformed_error!(
                "{} cannot carry a {:?} operand",
                instruction.mnemonic(),
                instruction.operand.operand_type()
            ));
        }
        self.instructions.push(instruction);
        Ok(self)
    }

    /// Defines `name` at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(malformed_error!("Label '{}' defined twice", name));
        }
        self.labels.insert(name.to_string(), self.instructions.len());
        Ok(self)
    }

    /// Emits a branch of kind `opcode` to `label`
    pub fn branch(&mut self, opcode: OpCode, label: &str) -> Result<&mut Self> {
        if !matches!(
            opcode.flow_type(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Leave
        ) {
            return Err(malformed_error!("{} is not a branch", opcode));
        }
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: vec![label.to_string()],
        });
        self.emit(Instruction::new(opcode, Operand::Target(0)))
    }

    /// Emits a jump table over `labels`
    pub fn switch(&mut self, labels: &[&str]) -> Result<&mut Self> {
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: labels.iter().map(ToString::to_string).collect(),
        });
        self.emit(Instruction::new(
            OpCode::Switch,
            Operand::Switch(vec![0; labels.len()]),
        ))
    }

    /// Resolves labels and returns the instructions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a branch names an undefined label.
    pub fn finish(mut self) -> Result<Vec<Instruction>> {
        for fixup in &self.fixups {
            let mut targets = Vec::with_capacity(fixup.labels.len());
            for label in &fixup.labels {
                let Some(&target) = self.labels.get(label) else {
                    return Err(malformed_error!("Undefined label '{}'", label));
                };
                targets.push(target);
            }

            let instruction = &mut self.instructions[fixup.instruction];
            instruction.operand = match instruction.operand {
                Operand::Switch(_) => Operand::Switch(targets),
                _ => Operand::Target(targets[0]),
            };
        }
        Ok(self.instructions)
    }

    /// Loads argument `slot`
    pub fn ldarg(&mut self, slot: u16) -> Result<&mut Self> {
        self.emit(Instruction::argument(ArgumentAccess::Load, slot))
    }

    /// Loads the address of argument `slot`
    pub fn ldarga(&mut self, slot: u16) -> Result<&mut Self> {
        self.emit(Instruction::argument(ArgumentAccess::LoadAddress, slot))
    }

    /// Stores into argument `slot`
    pub fn starg(&mut self, slot: u16) -> Result<&mut Self> {
        self.emit(Instruction::argument(ArgumentAccess::Store, slot))
    }

    /// Loads local `index`
    pub fn ldloc(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Instruction::ldloc(index))
    }

    /// Loads the address of local `index`
    pub fn ldloca(&mut self, index: u16) -> Result<&mut Self> {
        let opcode = if index <= 255 {
            OpCode::LdlocaS
        } else {
            OpCode::Ldloca
        };
        self.emit(Instruction::new(opcode, Operand::Local(index)))
    }

    /// Stores into local `index`
    pub fn stloc(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Instruction::stloc(index))
    }

    /// Pushes an `int32` constant
    pub fn ldc_i4(&mut self, value: i32) -> Result<&mut Self> {
        self.emit(Instruction::ldc_i4(value))
    }

    /// Pushes an `int64` constant
    pub fn ldc_i8(&mut self, value: i64) -> Result<&mut Self> {
        self.emit(Instruction::new(OpCode::LdcI8, Operand::Int64(value)))
    }

    /// Pushes a `float64` constant
    pub fn ldc_r8(&mut self, value: f64) -> Result<&mut Self> {
        self.emit(Instruction::new(OpCode::LdcR8, Operand::Float64(value)))
    }

    /// Pushes a string literal
    pub fn ldstr(&mut self, value: &str) -> Result<&mut Self> {
        self.emit(Instruction::ldstr(value))
    }

    /// Calls `method`
    pub fn call(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(Instruction::call(method))
    }

    /// Calls `method` through virtual dispatch
    pub fn callvirt(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(Instruction::new(OpCode::Callvirt, Operand::Method(method)))
    }

    /// Allocates an object and runs the constructor `method`
    pub fn newobj(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(Instruction::new(OpCode::Newobj, Operand::Method(method)))
    }

    simple_instructions! {
        /// `nop`
        nop => Nop;
        /// `ldarg.0`
        ldarg_0 => Ldarg0;
        /// `ldarg.1`
        ldarg_1 => Ldarg1;
        /// `ldarg.2`
        ldarg_2 => Ldarg2;
        /// `ldarg.3`
        ldarg_3 => Ldarg3;
        /// `ldloc.0`
        ldloc_0 => Ldloc0;
        /// `ldloc.1`
        ldloc_1 => Ldloc1;
        /// `stloc.0`
        stloc_0 => Stloc0;
        /// `stloc.1`
        stloc_1 => Stloc1;
        /// `ldnull`
        ldnull => Ldnull;
        /// `dup`
        dup => Dup;
        /// `pop`
        pop => Pop;
        /// `ret`
        ret => Ret;
        /// `endfinally`
        endfinally => Endfinally;
        /// `throw`
        throw => Throw;
        /// `rethrow`
        rethrow => Rethrow;
        /// `add`
        add => Add;
        /// `sub`
        sub => Sub;
        /// `mul`
        mul => Mul;
        /// `div`
        div => Div;
        /// `rem`
        rem => Rem;
        /// `neg`
        neg => Neg;
        /// `and`
        and => And;
        /// `or`
        or => Or;
        /// `xor`
        xor => Xor;
        /// `not`
        not => Not;
        /// `ceq`
        ceq => Ceq;
        /// `cgt`
        cgt => Cgt;
        /// `clt`
        clt => Clt;
        /// `conv.i4`
        conv_i4 => ConvI4;
        /// `conv.i8`
        conv_i8 => ConvI8;
        /// `conv.r8`
        conv_r8 => ConvR8;
        /// `ldlen`
        ldlen => Ldlen;
        /// `ldelem.ref`
        ldelem_ref => LdelemRef;
        /// `stelem.ref`
        stelem_ref => StelemRef;
        /// `ldelem.i4`
        ldelem_i4 => LdelemI4;
        /// `stelem.i4`
        stelem_i4 => StelemI4;
    }

    branch_instructions! {
        /// `br`
        br => Br;
        /// `brfalse`
        brfalse => Brfalse;
        /// `brtrue`
        brtrue => Brtrue;
        /// `beq`
        beq => Beq;
        /// `bne.un`
        bne_un => BneUn;
        /// `bge`
        bge => Bge;
        /// `bgt`
        bgt => Bgt;
        /// `ble`
        ble => Ble;
        /// `blt`
        blt => Blt;
        /// `leave`
        leave => Leave;
    }

    type_instructions! {
        /// `box`
        box_value => Box;
        /// `unbox.any`
        unbox_any => UnboxAny;
        /// `ldobj`
        ldobj => Ldobj;
        /// `castclass`
        castclass => Castclass;
        /// `isinst`
        isinst => Isinst;
        /// `newarr`
        newarr => Newarr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_backward_labels() {
        let mut asm = InstructionAssembler::new();
        asm.label("top")
            .unwrap()
            .ldarg_0()
            .unwrap()
            .brfalse("done")
            .unwrap()
            .br("top")
            .unwrap()
            .label("done")
            .unwrap()
            .ret()
            .unwrap();

        let instructions = asm.finish().unwrap();
        assert_eq!(instructions[1].operand, Operand::Target(3));
        assert_eq!(instructions[2].operand, Operand::Target(0));
    }

    #[test]
    fn switch_targets() {
        let mut asm = InstructionAssembler::new();
        asm.ldarg_0().unwrap();
        asm.switch(&["a", "b"]).unwrap();
        asm.label("a").unwrap().ret().unwrap();
        asm.label("b").unwrap().ret().unwrap();
        let instructions = asm.finish().unwrap();
        assert_eq!(instructions[1].operand, Operand::Switch(vec![2, 3]));
    }

    #[test]
    fn undefined_label() {
        let mut asm = InstructionAssembler::new();
        asm.br("nowhere").unwrap();
        assert!(asm.finish().is_err());
    }

    #[test]
    fn duplicate_label() {
        let mut asm = InstructionAssembler::new();
        asm.label("a").unwrap();
        assert!(asm.label("a").is_err());
    }

    #[test]
    fn compact_forms() {
        let mut asm = InstructionAssembler::new();
        asm.ldarg(1)
            .unwrap()
            .ldarg(9)
            .unwrap()
            .starg(2)
            .unwrap()
            .ldloc(5)
            .unwrap()
            .ldc_i4(100)
            .unwrap();
        let opcodes: Vec<OpCode> = asm.finish().unwrap().iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::Ldarg1,
                OpCode::LdargS,
                OpCode::StargS,
                OpCode::LdlocS,
                OpCode::LdcI4S
            ]
        );
    }

    #[test]
    fn rejects_non_branch() {
        let mut asm = InstructionAssembler::new();
        assert!(asm.branch(OpCode::Add, "x").is_err());
        assert!(asm
            .emit(Instruction::new(OpCode::Ldstr, Operand::Int32(1)))
            .is_err());
    }
}
