//! CIL instruction model and assembler.
//!
//! # Key Components
//!
//! - [`Instruction`], [`OpCode`], [`Operand`] - The closed instruction model bodies are made of
//! - [`InstructionAssembler`] - Fluent builder with symbolic branch labels
//!
//! # Examples
//!
//! ```rust
//! use cilweave::assembly::InstructionAssembler;
//!
//! let mut asm = InstructionAssembler::new();
//! asm.ldarg_0()?.ldarg_1()?.add()?.ret()?;
//! let listing: Vec<String> = asm.finish()?.iter().map(ToString::to_string).collect();
//! assert_eq!(listing, ["ldarg.0", "ldarg.1", "add", "ret"]);
//! # Ok::<(), cilweave::Error>(())
//! ```

mod assembler;
mod instruction;

pub use assembler::InstructionAssembler;
pub use instruction::{
    ArgumentAccess, FlowType, Instruction, OpCode, Operand, OperandType,
};
