use crate::{
    metadata::{customattributes::TagKind, MemberKind, MethodDef},
    validation::{mistake, ProxyValidator, ValidationContext},
    Result,
};

/// Rejects non-public static methods inside `ProxyOf`-tagged types.
///
/// Once the merge step has put proxy and target into one module, woven code can call a
/// private proxy helper that was never meant to be reachable from the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyMethodVisibilityValidator;

impl ProxyMethodVisibilityValidator {
    /// Creates the validator
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProxyValidator for ProxyMethodVisibilityValidator {
    fn validate(&self, context: &ValidationContext) -> Result<()> {
        let mut offenders = Vec::new();
        for ty in context.module().find_types(MemberKind::Any, &[TagKind::ProxyOf])? {
            offenders.extend(
                ty.find_methods(MemberKind::Static, &[])
                    .filter(|method| !method.is_public())
                    .map(MethodDef::qualified_name),
            );
        }

        if offenders.is_empty() {
            return Ok(());
        }
        Err(mistake(
            &offenders,
            "proxy method",
            "proxy methods",
            "not public. Every static method of a proxy type must be public.",
        ))
    }

    fn name(&self) -> &'static str {
        "ProxyMethodVisibilityValidator"
    }

    fn priority(&self) -> u32 {
        110
    }

    fn should_run(&self, context: &ValidationContext) -> bool {
        context.config().enable_visibility_validation
    }
}
