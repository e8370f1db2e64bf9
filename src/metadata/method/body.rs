//! Method body: instructions, local slots and exception handlers.
//!
//! A [`MethodBody`] is the unit the weaver grafts from a proxy onto a target. All
//! positions inside a body (branch targets, handler ranges) are instruction indices, so
//! splicing instructions in only needs an index map, see [`MethodBody::relocate`].

use crate::{
    assembly::{Instruction, OpCode},
    metadata::{method::ExceptionHandler, typesystem::TypeRef},
    Result,
};

/// A typed local variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// The type of this variable
    pub ty: TypeRef,
    /// This variable is pinned
    pub is_pinned: bool,
}

impl LocalVariable {
    /// An unpinned local of type `ty`
    #[must_use]
    pub fn new(ty: TypeRef) -> Self {
        LocalVariable {
            ty,
            is_pinned: false,
        }
    }
}

/// The body of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Locals are zero-initialized on entry
    pub init_locals: bool,
    /// Local variable slots, in slot order
    pub locals: Vec<LocalVariable>,
    /// Instructions, in execution order
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl Default for MethodBody {
    fn default() -> Self {
        MethodBody {
            max_stack: 8,
            init_locals: true,
            locals: Vec::new(),
            instructions: Vec::new(),
            exception_handlers: Vec::new(),
        }
    }
}

impl MethodBody {
    /// Returns true if the body has no instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Appends a local slot of type `ty` and returns its index
    pub fn add_local(&mut self, ty: TypeRef) -> Result<u16> {
        let index = u16::try_from(self.locals.len())
            .map_err(|_| malformed_error!("Too many locals - {}", self.locals.len()))?;
        self.locals.push(LocalVariable::new(ty));
        Ok(index)
    }

    /// Rewrites every instruction index in the body through `map`.
    ///
    /// `map` receives indices in `0..=len`; `len` appears as the exclusive end of a handler
    /// range that runs to the end of the body.
    pub fn relocate<F: Fn(usize) -> usize>(&mut self, map: F) {
        for instruction in &mut self.instructions {
            instruction.relocate(&map);
        }
        for handler in &mut self.exception_handlers {
            handler.relocate(&map);
        }
    }

    /// Inserts `preamble` before the first instruction, keeping targets and handlers attached
    /// to the instructions they referred to.
    pub fn prepend(&mut self, preamble: Vec<Instruction>) {
        let count = preamble.len();
        if count == 0 {
            return;
        }

        self.relocate(|index| index + count);

        let mut instructions = preamble;
        instructions.append(&mut self.instructions);
        self.instructions = instructions;
    }

    /// Indices of all `ret` instructions
    #[must_use]
    pub fn returns(&self) -> Vec<usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| instruction.opcode == OpCode::Ret)
            .map(|(index, _)| index)
            .collect()
    }

    /// Checks that every operand fits its opcode and every index stays inside the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] naming the first offending instruction or handler.
    pub fn validate(&self) -> Result<()> {
        let len = self.instructions.len();
        for (index, instruction) in self.instructions.iter().enumerate() {
            if !instruction.is_well_formed() {
                return Err(malformed_error!(
                    "IL_{:04}: {} carries a {:?} operand",
                    index,
                    instruction.mnemonic(),
                    instruction.operand.operand_type()
                ));
            }

            if let Some(target) = instruction.targets().into_iter().find(|&t| t >= len) {
                return Err(malformed_error!(
                    "IL_{:04}: {} targets IL_{:04} outside of the body",
                    index,
                    instruction.mnemonic(),
                    target
                ));
            }

            if let Some(local) = instruction.local_index() {
                if usize::from(local) >= self.locals.len() {
                    return Err(malformed_error!(
                        "IL_{:04}: {} refers to missing local V_{}",
                        index,
                        instruction.mnemonic(),
                        local
                    ));
                }
            }
        }

        for (index, handler) in self.exception_handlers.iter().enumerate() {
            if !handler.is_within(len) {
                return Err(malformed_error!(
                    "Exception handler {} has ranges outside of the body",
                    index
                ));
            }
        }

        Ok(())
    }
}
