use thiserror::Error;

use crate::emulation::EmulationError;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is fatal to the (proxy, target) pair currently being processed. Nothing in
/// the engine retries, and no variant is ever raised after the woven module has been handed
/// to the [`crate::file::ModuleWriter`].
///
/// # Error Categories
///
/// ## Lookup and Matching
/// - [`Error::TypeNotFound`] - Exact-name type lookup failed
/// - [`Error::MatchNotFound`] - A declared correspondence could not be resolved
/// - [`Error::AmbiguousMatch`] - More than one target satisfies a declared correspondence
/// - [`Error::MultipleTargets`] - One proxy module names several target modules
///
/// ## Proxy Authoring Mistakes
/// - [`Error::ProxyMistake`] - Structural precondition on the proxy module failed
/// - [`Error::InvalidEntry`] - Entry hook signature is non-conforming
/// - [`Error::InvalidExit`] - Exit hook signature is non-conforming
///
/// ## Collaborators
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Merge`] - The merge service failed
/// - [`Error::NotImplemented`] - An operation was requested on an unsupported module kind
/// - [`Error::Malformed`] - A module or body is structurally broken
/// - [`Error::Emulation`] - Executing a body in the [`crate::emulation::Interpreter`] failed
///
/// # Examples
///
/// ```rust,no_run
/// use cilweave::{Error, metadata::Module};
///
/// # fn get_module() -> Module { unimplemented!() }
/// let module = get_module();
/// match module.find_type("Demo.Greeter") {
///     Ok(ty) => println!("Found {}", ty.full_name()),
///     Err(Error::TypeNotFound(name)) => eprintln!("No type named {name}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The module or method body is damaged and could not be processed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Failed to find a type by its exact full name.
    #[error("Failed to find type - {0}")]
    TypeNotFound(String),

    /// A declared correspondence (type or method) could not be resolved.
    ///
    /// Raised when a proxy type names a target type that does not exist, or when no target
    /// method shares the proxy method's name, return type, parameters and generic signature.
    #[error("No match found for {element} in {container}")]
    MatchNotFound {
        /// Qualified name of the proxy element that was searched for
        element: String,
        /// Name of the module or type that was searched
        container: String,
    },

    /// More than one target satisfies a declared correspondence.
    ///
    /// Also raised when a target method would be claimed by a second proxy method in the
    /// same pass. Ambiguity is never resolved by picking one of the candidates.
    #[error("{element} matches more than one element in {container}: {}", .candidates.join(", "))]
    AmbiguousMatch {
        /// Qualified name of the proxy element
        element: String,
        /// Name of the module or type that was searched
        container: String,
        /// Qualified names of every competing candidate
        candidates: Vec<String>,
    },

    /// One proxy module names more than one distinct target module.
    #[error("The proxy module {module} targets several modules: {}", .targets.join(", "))]
    MultipleTargets {
        /// Name of the proxy module
        module: String,
        /// The distinct target module names, sorted
        targets: Vec<String>,
    },

    /// A structural precondition on the proxy module failed.
    ///
    /// The message enumerates every offending member by qualified name.
    #[error("{0}")]
    ProxyMistake(String),

    /// The entry hook method's signature is non-conforming.
    #[error("The entry hook {method} is invalid: {rule}")]
    InvalidEntry {
        /// Qualified name of the hook method
        method: String,
        /// The rule that was violated
        rule: &'static str,
    },

    /// The exit hook method's signature is non-conforming.
    #[error("The exit hook {method} is invalid: {rule}")]
    InvalidExit {
        /// Qualified name of the hook method
        method: String,
        /// The rule that was violated
        rule: &'static str,
    },

    /// The requested operation is not implemented for this kind of object.
    #[error("Not implemented - {0}")]
    NotImplemented(String),

    /// The merge service failed to produce the merged module.
    #[error("Merge failed - {0}")]
    Merge(String),

    /// Executing a method body in the interpreter failed.
    #[error("{0}")]
    Emulation(#[from] EmulationError),
}
