//! Pre-flight checks over a proxy module.
//!
//! Proxy authors only ever declare static stand-in containers with public stand-in methods.
//! Anything else is almost certainly a mistake, and after the merge step it would compile
//! into something that fails confusingly at runtime. The [`ValidationEngine`] therefore runs
//! once per proxy module, before any weaving, and every failure is fatal.
//!
//! # Key Components
//!
//! - [`ProxyValidator`] - The interface every check implements
//! - [`ValidationEngine`] - Runs the checks in priority order, stopping at the first failure
//! - [`InstanceTypeValidator`] - No instance types besides the `<Module>` placeholder
//! - [`ProxyMethodVisibilityValidator`] - No non-public static methods in proxy types
//! - [`ValidationConfig`] - Enables or disables individual checks
//!
//! # Examples
//!
//! ```rust
//! use cilweave::{
//!     metadata::{ModuleBuilder, TypeBuilder},
//!     validation::{ValidationConfig, ValidationEngine},
//!     Error,
//! };
//!
//! let proxies = ModuleBuilder::new("Proxies")
//!     .add_type(TypeBuilder::new("Demo").public())
//!     .add_type(TypeBuilder::new("Other").public())
//!     .build()?;
//!
//! let result = ValidationEngine::new().run(&proxies, &ValidationConfig::default());
//! assert!(matches!(result, Err(Error::ProxyMistake(message)) if message.contains("Demo, Other")));
//! # Ok::<(), cilweave::Error>(())
//! ```

mod config;
mod types;
mod visibility;

pub use config::ValidationConfig;
pub use types::InstanceTypeValidator;
pub use visibility::ProxyMethodVisibilityValidator;

use crate::{metadata::Module, Error, Result};

/// What a [`ProxyValidator`] sees.
pub struct ValidationContext<'a> {
    module: &'a Module,
    config: &'a ValidationConfig,
}

impl<'a> ValidationContext<'a> {
    /// A context validating `module` under `config`
    #[must_use]
    pub fn new(module: &'a Module, config: &'a ValidationConfig) -> Self {
        ValidationContext { module, config }
    }

    /// The proxy module under validation
    #[must_use]
    pub fn module(&self) -> &'a Module {
        self.module
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &'a ValidationConfig {
        self.config
    }
}

/// A structural check over a proxy module.
pub trait ProxyValidator: Send + Sync {
    /// Runs the check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProxyMistake`] naming every offending member.
    fn validate(&self, context: &ValidationContext) -> Result<()>;

    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Validators with lower priority values run first
    fn priority(&self) -> u32;

    /// Returns false if the configuration disables this validator
    fn should_run(&self, context: &ValidationContext) -> bool;
}

/// Runs [`ProxyValidator`]s in priority order.
pub struct ValidationEngine {
    validators: Vec<Box<dyn ProxyValidator>>,
}

impl ValidationEngine {
    /// An engine running the built-in validators
    #[must_use]
    pub fn new() -> Self {
        Self::with_validators(vec![
            Box::new(InstanceTypeValidator::new()),
            Box::new(ProxyMethodVisibilityValidator::new()),
        ])
    }

    /// An engine running exactly `validators`
    #[must_use]
    pub fn with_validators(mut validators: Vec<Box<dyn ProxyValidator>>) -> Self {
        validators.sort_by_key(|validator| validator.priority());
        ValidationEngine { validators }
    }

    /// Validates `module`, stopping at the first failing validator
    ///
    /// # Errors
    ///
    /// The first failure, unmodified; parse errors of the lazily loaded module propagate too.
    pub fn run(&self, module: &Module, config: &ValidationConfig) -> Result<()> {
        let context = ValidationContext::new(module, config);
        for validator in &self.validators {
            if !validator.should_run(&context) {
                log::debug!("Skipping {} for {}", validator.name(), module.name());
                continue;
            }
            log::debug!("Running {} on {}", validator.name(), module.name());
            validator.validate(&context)?;
        }
        Ok(())
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the [`Error::ProxyMistake`] for a non-empty list of offenders.
///
/// The wording distinguishes one offender from several.
pub(crate) fn mistake(offenders: &[String], singular: &str, plural: &str, rule: &str) -> Error {
    let subject = match offenders {
        [single] => format!("{singular} {single} is"),
        _ => format!("{plural} {} are", offenders.join(", ")),
    };
    Error::ProxyMistake(format!("The {subject} {rule}"))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::test::{create_module, create_type, PROXIES};

    struct Recording {
        priority: u32,
        order: Arc<AtomicUsize>,
        seen: Arc<AtomicUsize>,
    }

    impl ProxyValidator for Recording {
        fn validate(&self, _context: &ValidationContext) -> Result<()> {
            let position = self.order.fetch_add(1, Ordering::SeqCst);
            self.seen.store(position, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Recording"
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn should_run(&self, _context: &ValidationContext) -> bool {
            true
        }
    }

    #[test]
    fn priority_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(usize::MAX));
        let early = Arc::new(AtomicUsize::new(usize::MAX));
        let engine = ValidationEngine::with_validators(vec![
            Box::new(Recording {
                priority: 200,
                order: order.clone(),
                seen: late.clone(),
            }),
            Box::new(Recording {
                priority: 100,
                order: order.clone(),
                seen: early.clone(),
            }),
        ]);

        engine
            .run(&create_module(PROXIES, Vec::new()), &ValidationConfig::default())
            .unwrap();
        assert_eq!(early.load(Ordering::SeqCst), 0);
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_checks_are_skipped() {
        let module = create_module(PROXIES, vec![create_type("Demo")]);
        assert!(ValidationEngine::new()
            .run(&module, &ValidationConfig::default())
            .is_err());
        assert!(ValidationEngine::new()
            .run(&module, &ValidationConfig::disabled())
            .is_ok());
    }

    #[test]
    fn mistake_wording() {
        let one = mistake(&["Demo".to_string()], "type", "types", "not static.");
        assert_eq!(one.to_string(), "The type Demo is not static.");

        let two = mistake(
            &["Demo".to_string(), "Other".to_string()],
            "type",
            "types",
            "not static.",
        );
        assert_eq!(two.to_string(), "The types Demo, Other are not static.");
    }
}
