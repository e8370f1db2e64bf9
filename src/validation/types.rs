use crate::{
    metadata::{MemberKind, TypeDef},
    validation::{mistake, ProxyValidator, ValidationContext},
    Result,
};

/// Rejects proxy modules declaring instance types.
///
/// The compiler-synthesized `<Module>` placeholder is the only non-static type a proxy
/// module may contain; any other one signals a typo in the proxy declaration.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstanceTypeValidator;

impl InstanceTypeValidator {
    /// Creates the validator
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProxyValidator for InstanceTypeValidator {
    fn validate(&self, context: &ValidationContext) -> Result<()> {
        let offenders: Vec<String> = context
            .module()
            .find_types(MemberKind::Instance, &[])?
            .filter(|ty| !ty.is_module_placeholder())
            .map(TypeDef::full_name)
            .collect();

        if offenders.is_empty() {
            return Ok(());
        }
        Err(mistake(
            &offenders,
            "type",
            "types",
            "not static. Proxy modules may only declare static types.",
        ))
    }

    fn name(&self) -> &'static str {
        "InstanceTypeValidator"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn should_run(&self, context: &ValidationContext) -> bool {
        context.config().enable_instance_type_validation
    }
}
