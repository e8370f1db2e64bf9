use thiserror::Error;

/// Errors raised while executing a method body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmulationError {
    /// An instruction needed more values than the evaluation stack held.
    #[error("Evaluation stack underflow at {0}")]
    StackUnderflow(&'static str),

    /// An instruction referred to an argument slot the frame does not have.
    #[error("Argument slot {0} does not exist")]
    InvalidArgument(u16),

    /// An instruction referred to a local slot the body does not declare.
    #[error("Local slot {0} does not exist")]
    InvalidLocal(u16),

    /// An instruction carried an operand its opcode does not take.
    #[error("{0} carries an unexpected operand")]
    InvalidOperand(&'static str),

    /// Control reached an index outside of the body.
    #[error("Execution left the body of {method} at IL_{index:04}")]
    InvalidTarget {
        /// Qualified name of the executing method
        method: String,
        /// The index control reached
        index: usize,
    },

    /// An operand had the wrong kind of value.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the instruction needed
        expected: &'static str,
        /// What it got
        found: String,
    },

    /// `castclass` or `unbox.any` on an incompatible value.
    #[error("Invalid cast from {found} to {target}")]
    InvalidCast {
        /// Type of the value
        found: String,
        /// The requested type
        target: String,
    },

    /// A null reference was dereferenced.
    #[error("Null reference")]
    NullReference,

    /// An array access was out of bounds.
    #[error("Array index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds {
        /// The requested index
        index: i64,
        /// The array length
        length: usize,
    },

    /// Integer division by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// A call target is neither defined by the module nor registered as a native.
    #[error("No method {0} in the module or the native registry")]
    MethodNotFound(String),

    /// A native implementation rejected its arguments.
    #[error("Native {method} failed: {message}")]
    Native {
        /// The native's qualified name
        method: String,
        /// What went wrong
        message: String,
    },

    /// `throw` or `rethrow` was executed.
    #[error("Unhandled exception: {0}")]
    Unhandled(String),

    /// The instruction is outside of what the interpreter executes.
    #[error("{0} is not supported by the interpreter")]
    Unsupported(&'static str),

    /// More instructions were executed than the configured limit.
    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(usize),

    /// Calls nested deeper than the configured limit.
    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),
}
