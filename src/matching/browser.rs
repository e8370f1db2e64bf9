use std::collections::{BTreeSet, HashMap};

use crate::{
    matching::{Matching, MethodMatching, Pair, TypeMatching},
    metadata::{
        customattributes::TagKind, token::Token, typesystem::TypeScope, MemberKind, MethodDef,
        Module, TypeDef,
    },
    Error, Result,
};

/// Pairs every static `ProxyOf`-tagged type of a proxy module with its target type.
pub struct AssemblyBrowser<'a, M = TypeMatching> {
    proxy: &'a Module,
    target: &'a Module,
    matching: M,
}

impl<'a> AssemblyBrowser<'a> {
    /// Browses `proxy` for types standing in for types of `target`
    #[must_use]
    pub fn new(proxy: &'a Module, target: &'a Module) -> Self {
        Self::with_matching(proxy, target, TypeMatching)
    }
}

impl<'a, M: Matching<TypeDef, Module>> AssemblyBrowser<'a, M> {
    /// Browses with a custom type matching
    pub fn with_matching(proxy: &'a Module, target: &'a Module, matching: M) -> Self {
        AssemblyBrowser {
            proxy,
            target,
            matching,
        }
    }

    /// Resolves every proxy type, failing on the first one without a target
    pub fn pairs(&self) -> Result<Vec<Pair<TypeDef>>> {
        self.proxy
            .find_types(MemberKind::Static, &[TagKind::ProxyOf])?
            .map(|proxy| {
                let target = self.matching.find_match(proxy, self.target)?;
                Ok(Pair::new(proxy.token, target.token))
            })
            .collect()
    }
}

/// Pairs every static `ProxyMethod`-tagged method of a proxy type with its target method.
pub struct TypeBrowser<'a, M = MethodMatching> {
    proxy: &'a TypeDef,
    target: &'a TypeDef,
    matching: M,
}

impl<'a> TypeBrowser<'a> {
    /// Browses the proxy type `proxy` for methods standing in for methods of `target`
    #[must_use]
    pub fn new(proxy: &'a TypeDef, target: &'a TypeDef) -> Self {
        Self::with_matching(proxy, target, MethodMatching)
    }
}

impl<'a, M: Matching<MethodDef, TypeDef>> TypeBrowser<'a, M> {
    /// Browses with a custom method matching
    pub fn with_matching(proxy: &'a TypeDef, target: &'a TypeDef, matching: M) -> Self {
        TypeBrowser {
            proxy,
            target,
            matching,
        }
    }

    /// Resolves every proxy method, failing on the first one without a unique target
    pub fn pairs(&self) -> Result<Vec<Pair<MethodDef>>> {
        let pairs = self
            .proxy
            .find_methods(MemberKind::Static, &[TagKind::ProxyMethod])
            .map(|proxy| {
                let target = self.matching.find_match(proxy, self.target)?;
                log::debug!("{} stands in for {}", proxy.qualified_name(), target);
                Ok(Pair::new(proxy.token, target.token))
            })
            .collect::<Result<Vec<_>>>()?;

        if pairs.is_empty() {
            log::warn!(
                "{} stands in for {} but declares no proxy methods",
                self.proxy.full_name(),
                self.target.full_name()
            );
        }
        Ok(pairs)
    }
}

/// A matched pair of types together with the matched pairs of their methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatch {
    /// The proxy type and the type it stands in for
    pub types: Pair<TypeDef>,
    /// The proxy methods of that type and the methods they stand in for
    pub methods: Vec<Pair<MethodDef>>,
}

/// Runs one complete matching pass over `module`, which holds both proxy and target types.
///
/// # Errors
///
/// Besides the errors of [`TypeMatching`] and [`MethodMatching`], returns
/// [`Error::AmbiguousMatch`] if two proxy methods resolve to the same target method.
pub fn browse(module: &Module) -> Result<Vec<TypeMatch>> {
    let mut claims: HashMap<Token, String> = HashMap::new();
    let mut matches = Vec::new();

    for types in AssemblyBrowser::new(module, module).pairs()? {
        let proxy = module.type_by_token(types.proxy)?;
        let target = module.type_by_token(types.target)?;
        let methods = TypeBrowser::new(proxy, target).pairs()?;

        for pair in &methods {
            let claimant = module.method(pair.proxy)?.qualified_name();
            if let Some(previous) = claims.insert(pair.target, claimant.clone()) {
                let target = module.method(pair.target)?;
                return Err(Error::AmbiguousMatch {
                    element: target.qualified_name(),
                    container: module.name().to_string(),
                    candidates: vec![previous, claimant],
                });
            }
        }

        matches.push(TypeMatch { types, methods });
    }

    Ok(matches)
}

/// The single module the static `ProxyOf`-tagged types of `proxy` stand in for.
///
/// Returns `None` when the proxy module declares no proxy types, or only proxies of its own
/// types.
///
/// # Errors
///
/// Returns [`Error::MultipleTargets`] listing every distinct module name when the proxy
/// types name more than one.
pub fn find_target_module(proxy: &Module) -> Result<Option<String>> {
    let targets: BTreeSet<&str> = proxy
        .find_types(MemberKind::Static, &[TagKind::ProxyOf])?
        .filter_map(TypeDef::proxy_target)
        .filter_map(|target| match target.scope() {
            TypeScope::External(name) => Some(name.as_str()),
            TypeScope::Local => None,
        })
        .collect();

    match targets.len() {
        0 => Ok(None),
        1 => Ok(targets.into_iter().next().map(str::to_string)),
        _ => Err(Error::MultipleTargets {
            module: proxy.name().to_string(),
            targets: targets.into_iter().map(str::to_string).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::customattributes::TargetMethodType,
        test::{
            create_module, create_static_method, create_static_type, create_type, proxy_method,
            proxy_of, LIBRARY, PROXIES,
        },
    };

    fn greeter() -> TypeDef {
        let mut ty = create_type("Demo.Greeter");
        ty.methods
            .push(crate::test::create_method("Demo.Greeter", "SayHello"));
        ty
    }

    fn greeter_proxy(name: &str, methods: &[&str]) -> TypeDef {
        let mut ty = create_static_type(name);
        ty.custom_attributes.push(proxy_of("Demo.Greeter", LIBRARY));
        for method in methods {
            let mut proxy = create_static_method(name, method);
            proxy
                .custom_attributes
                .push(proxy_method(TargetMethodType::Instance, Some("SayHello")));
            ty.methods.push(proxy);
        }
        ty
    }

    #[test]
    fn browse_pairs_types_and_methods() {
        let module = create_module(
            LIBRARY,
            vec![greeter(), greeter_proxy("Demo.GreeterProxy", &["Hello"])],
        );
        let matches = browse(&module).unwrap();
        assert_eq!(matches.len(), 1);

        let found = &matches[0];
        assert_eq!(
            module.type_by_token(found.types.target).unwrap().full_name(),
            "Demo.Greeter"
        );
        assert_eq!(found.methods.len(), 1);
        assert_eq!(module.method(found.methods[0].proxy).unwrap().name, "Hello");
        assert_eq!(module.method(found.methods[0].target).unwrap().name, "SayHello");
    }

    #[test]
    fn second_claim_is_ambiguous() {
        let module = create_module(
            LIBRARY,
            vec![greeter(), greeter_proxy("Demo.GreeterProxy", &["Hello", "Hi"])],
        );
        match browse(&module) {
            Err(Error::AmbiguousMatch {
                element,
                candidates,
                ..
            }) => {
                assert_eq!(element, "Demo.Greeter::SayHello");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected an ambiguous match, got {other:?}"),
        }
    }

    #[test]
    fn claims_span_proxy_types() {
        let module = create_module(
            LIBRARY,
            vec![
                greeter(),
                greeter_proxy("Demo.GreeterProxy", &["Hello"]),
                greeter_proxy("Demo.OtherProxy", &["Hello"]),
            ],
        );
        assert!(matches!(browse(&module), Err(Error::AmbiguousMatch { .. })));
    }

    #[test]
    fn instance_types_are_not_browsed() {
        let mut proxy = greeter_proxy("Demo.GreeterProxy", &["Hello"]);
        proxy.flags = crate::metadata::TypeAttributes::PUBLIC;
        let module = create_module(LIBRARY, vec![greeter(), proxy]);
        assert!(browse(&module).unwrap().is_empty());
    }

    #[test]
    fn proxy_type_without_methods() {
        let module = create_module(
            LIBRARY,
            vec![greeter(), greeter_proxy("Demo.GreeterProxy", &[])],
        );
        let matches = browse(&module).unwrap();
        assert!(matches[0].methods.is_empty());
    }

    #[test]
    fn single_target_module() {
        let module = create_module(PROXIES, vec![greeter_proxy("Demo.GreeterProxy", &[])]);
        assert_eq!(
            find_target_module(&module).unwrap().as_deref(),
            Some(LIBRARY)
        );
        assert_eq!(find_target_module(&create_module(PROXIES, Vec::new())).unwrap(), None);
    }

    #[test]
    fn several_target_modules() {
        let mut other = create_static_type("Demo.ClockProxy");
        other.custom_attributes.push(proxy_of("System.Clock", "Runtime"));
        let module = create_module(
            PROXIES,
            vec![greeter_proxy("Demo.GreeterProxy", &[]), other],
        );
        match find_target_module(&module) {
            Err(Error::MultipleTargets { module, targets }) => {
                assert_eq!(module, PROXIES);
                assert_eq!(targets, vec![LIBRARY.to_string(), "Runtime".to_string()]);
            }
            other => panic!("expected multiple targets, got {other:?}"),
        }
    }
}
