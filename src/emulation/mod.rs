//! A small stack-machine interpreter for method bodies.
//!
//! Weaving changes what a method does, but not in a way that can be read off the metadata
//! alone. The interpreter executes the woven body, with its hook calls, so that the effect
//! of a substitution can be observed: the value a method returns, and every call it makes
//! along the way.
//!
//! # Key Components
//!
//! - [`Interpreter`] - Executes module methods, records every call in a [`CallRecord`]
//! - [`EmValue`] - Runtime values: integers, floats, strings, boxes, arrays, objects
//! - [`NativeRegistry`] - Host implementations of methods the module only references
//! - [`EmulationError`] - Why a run was aborted
//!
//! # Scope
//!
//! Every [`crate::assembly::OpCode`] is handled. Address loads (`ldarga`, `ldloca`) and
//! `endfinally` report [`EmulationError::Unsupported`]; fields and exception handlers are
//! not modelled.

mod error;
mod interpreter;
mod natives;
mod value;

pub use error::EmulationError;
pub use interpreter::{CallRecord, Interpreter, DEFAULT_DEPTH_LIMIT, DEFAULT_STEP_LIMIT};
pub use natives::{native, NativeFn, NativeRegistry};
pub use value::{ArrayRef, EmValue};
