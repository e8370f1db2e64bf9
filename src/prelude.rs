//! # cilweave Prelude
//!
//! The types needed to author modules, run the pipeline and observe its result, importable
//! with a single glob.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilweave operations
pub use crate::Error;

/// The result type used throughout cilweave
pub use crate::Result;

// ================================================================================================
// Pipeline
// ================================================================================================

/// End-to-end processing of (proxy, target) pairs
pub use crate::tampering::{ModulePair, PublicKeyModel, Tampering, TamperingOptions};

/// Boundaries to the binary format, with their in-memory implementations
pub use crate::file::{
    MemoryStore, MergeRequest, MergeService, ModuleReader, ModuleWriter, UnionMerge,
};

/// Proxy module checks
pub use crate::validation::{ProxyValidator, ValidationConfig, ValidationEngine};

/// Matching and weaving stages
pub use crate::matching::{browse, find_target_module, Pair, TypeMatch};
pub use crate::weaving::Weaver;

// ================================================================================================
// Object Model
// ================================================================================================

/// Modules, types and methods
pub use crate::metadata::{
    method::{MethodBody, Parameter},
    MemberKind, MethodDef, MethodRef, Module, TypeDef,
};

/// Builders for in-memory modules
pub use crate::metadata::{
    MethodBodyBuilder, MethodBuilder, ModuleBuilder, PropertyBuilder, TypeBuilder,
};

/// Type references and their scopes
pub use crate::metadata::typesystem::{TypeRef, TypeScope};

/// Declarative tags
pub use crate::metadata::customattributes::{Tag, TagKind, TargetMethodType};

/// Assembly identity
pub use crate::metadata::identity::{PublicKey, Version};

/// Metadata tokens
pub use crate::metadata::token::Token;

/// Instructions and the assembler
pub use crate::assembly::{Instruction, InstructionAssembler, OpCode, Operand};

// ================================================================================================
// Emulation
// ================================================================================================

/// Executing woven bodies
pub use crate::emulation::{CallRecord, EmValue, EmulationError, Interpreter, NativeRegistry};
