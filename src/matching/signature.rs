//! The comparable shape of a method.

use std::fmt;

use crate::metadata::{method::ParameterVariant, MethodDef};

/// Everything method correspondence compares, extracted from a [`MethodDef`].
///
/// Two methods correspond iff their signatures are equal: same effective name, same return
/// type full name, same ordered `(variant, type full name)` parameters, and same generic
/// constraint signature. Static-ness and visibility are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Override name from the proxy-method tag, else the short name
    pub name: String,
    /// Full name of the return type
    pub return_type: String,
    /// Passing variant and type full name of each declared parameter
    pub parameters: Vec<(ParameterVariant, String)>,
    /// Per generic parameter, the serialized constraint set
    pub generics: Vec<String>,
}

impl MethodSignature {
    /// Extracts the signature of `method`
    #[must_use]
    pub fn of(method: &MethodDef) -> Self {
        MethodSignature {
            name: method.effective_name().to_string(),
            return_type: method.return_type.full_name().to_string(),
            parameters: method
                .params
                .iter()
                .map(|param| (param.variant, param.ty.full_name().to_string()))
                .collect(),
            generics: method.generic_signature(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.return_type, self.name)?;
        if !self.generics.is_empty() {
            let generics: Vec<String> = self
                .generics
                .iter()
                .map(|constraints| format!("<{constraints}>"))
                .collect();
            write!(f, "{}", generics.join(""))?;
        }
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|(variant, ty)| match variant {
                ParameterVariant::In => ty.clone(),
                other => format!("{other} {ty}"),
            })
            .collect();
        write!(f, "({})", parameters.join(", "))
    }
}
