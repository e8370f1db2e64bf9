//! Whole-body replacement and argument slot renumbering.

use crate::{
    assembly::Instruction,
    metadata::method::MethodBody,
    Result,
};

/// Replaces the contents of `destination` with copies of `proxy`'s.
///
/// Locals, exception handlers and instructions are replaced wholesale, together with the
/// stack size and local initialization flag. Nothing of the destination's previous body
/// survives.
pub fn replace_body(destination: &mut MethodBody, proxy: &MethodBody) {
    destination.locals = proxy.locals.clone();
    destination.exception_handlers = proxy.exception_handlers.clone();
    destination.instructions = proxy.instructions.clone();
    destination.max_stack = proxy.max_stack;
    destination.init_locals = proxy.init_locals;
}

/// Moves every access to declared parameter slot `k < parameter_count` to slot `k + 1`.
///
/// Used when a static proxy body lands in an instance method, whose slot 0 holds the
/// receiver. Loads, address loads and stores are rewritten to the most compact encoding of
/// the new slot; every other instruction is left untouched. Returns the number of rewritten
/// instructions.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if a shifted slot no longer fits the operand.
pub fn shift_arguments(body: &mut MethodBody, parameter_count: usize) -> Result<usize> {
    let mut shifted = 0;
    for (index, instruction) in body.instructions.iter_mut().enumerate() {
        let Some(access) = instruction.opcode.argument_access() else {
            continue;
        };
        let Some(slot) = instruction.argument_slot() else {
            return Err(malformed_error!(
                "IL_{:04}: {} has no argument operand",
                index,
                instruction.mnemonic()
            ));
        };
        if usize::from(slot) >= parameter_count {
            continue;
        }

        let slot = slot.checked_add(1).ok_or_else(|| {
            malformed_error!("IL_{:04}: argument slot {} cannot be shifted", index, slot)
        })?;
        *instruction = Instruction::argument(access, slot);
        shifted += 1;
    }
    Ok(shifted)
}
