//! Configuration of the proxy module checks.

/// Selects which checks run on a proxy module before anything is woven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Reject instance types other than the `<Module>` placeholder
    pub enable_instance_type_validation: bool,

    /// Reject non-public static methods inside `ProxyOf`-tagged types
    pub enable_visibility_validation: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable_instance_type_validation: true,
            enable_visibility_validation: true,
        }
    }
}

impl ValidationConfig {
    /// Creates a configuration with every check disabled
    ///
    /// **Warning**: proxy authoring mistakes then surface as confusing failures at runtime.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable_instance_type_validation: false,
            enable_visibility_validation: false,
        }
    }

    /// Creates a configuration with every check enabled
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }
}
