use crate::{
    matching::Matching,
    metadata::{Module, TypeDef},
    Error, Result,
};

/// Type correspondence: the `ProxyOf` tag names the target unambiguously, so the target is
/// looked up by exact full name and nothing else is compared.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeMatching;

impl Matching<TypeDef, Module> for TypeMatching {
    fn find_match<'a>(&self, proxy: &TypeDef, module: &'a Module) -> Result<&'a TypeDef> {
        let not_found = || Error::MatchNotFound {
            element: proxy.full_name(),
            container: module.name().to_string(),
        };

        let target = proxy.proxy_target().ok_or_else(not_found)?;
        log::debug!(
            "Searching for {} (proxied by {}) in {}",
            target,
            proxy.full_name(),
            module.name()
        );

        match module.find_type(target.full_name()) {
            Ok(found) => Ok(found),
            Err(Error::TypeNotFound(_)) => Err(not_found()),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{create_module, create_static_type, create_type, library_ref, LIBRARY};
    use crate::metadata::customattributes::Tag;

    fn proxy_for(target: &str) -> TypeDef {
        let mut proxy = create_static_type("Demo.GreeterProxy");
        proxy.tags.push(Tag::ProxyOf {
            target: library_ref(target),
        });
        proxy
    }

    #[test]
    fn finds_exact_type() {
        let module = create_module(
            LIBRARY,
            vec![create_type("Demo.Greeter"), create_type("Demo.GreeterFactory")],
        );
        for _ in 0..3 {
            let found = TypeMatching
                .find_match(&proxy_for("Demo.Greeter"), &module)
                .unwrap();
            assert_eq!(found.full_name(), "Demo.Greeter");
        }
    }

    #[test]
    fn missing_target() {
        let module = create_module(LIBRARY, vec![create_type("Demo.Greeter")]);
        let result = TypeMatching.find_match(&proxy_for("Demo.Welcomer"), &module);
        assert!(matches!(
            result,
            Err(Error::MatchNotFound { element, container })
                if element == "Demo.GreeterProxy" && container == LIBRARY
        ));
    }

    #[test]
    fn untagged_proxy() {
        let module = create_module(LIBRARY, vec![create_type("Demo.Greeter")]);
        let result = TypeMatching.find_match(&create_static_type("Demo.Greeter"), &module);
        assert!(matches!(result, Err(Error::MatchNotFound { .. })));
    }
}
