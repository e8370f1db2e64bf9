use crate::{
    matching::{Matching, MethodSignature},
    metadata::{customattributes::TargetMethodType, MemberKind, MethodDef, TypeDef},
    Error, Result,
};

/// Method correspondence within an already matched pair of types.
///
/// Candidates are the target type's methods admitted by the proxy's [`TargetMethodType`]
/// (any static-ness when the proxy method carries no tag). Among them exactly one must have
/// a [`MethodSignature`] equal to the proxy's.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodMatching;

impl Matching<MethodDef, TypeDef> for MethodMatching {
    fn find_match<'a>(&self, proxy: &MethodDef, target: &'a TypeDef) -> Result<&'a MethodDef> {
        let wanted = MethodSignature::of(proxy);
        let kind = MemberKind::from(proxy.proxy_target_kind().unwrap_or(TargetMethodType::Any));
        log::debug!(
            "Searching for a match of {} ({}) in {}",
            proxy.qualified_name(),
            wanted,
            target.full_name()
        );

        let candidates: Vec<&MethodDef> = target
            .find_methods(kind, &[])
            .filter(|method| MethodSignature::of(method) == wanted)
            .collect();

        match candidates.as_slice() {
            [] => Err(Error::MatchNotFound {
                element: proxy.qualified_name(),
                container: target.full_name(),
            }),
            [found] => Ok(*found),
            _ => Err(Error::AmbiguousMatch {
                element: proxy.qualified_name(),
                container: target.full_name(),
                candidates: candidates.iter().map(ToString::to_string).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            customattributes::Tag,
            generics::GenericParam,
            method::{Parameter, ParameterVariant},
            token::Token,
            typesystem::TypeRef,
        },
        test::{create_method, create_static_method, create_type},
    };

    fn say_hello(declaring_type: &str, is_static: bool) -> MethodDef {
        let mut method = if is_static {
            create_static_method(declaring_type, "SayHello")
        } else {
            create_method(declaring_type, "SayHello")
        };
        method.return_type = TypeRef::string();
        method.params = vec![
            Parameter::new("name", TypeRef::string()),
            Parameter::new("count", TypeRef::int32()),
        ];
        method
            .generic_params
            .push(GenericParam::new("T").constraint(TypeRef::class("System.IComparable")));
        method
    }

    fn proxy() -> MethodDef {
        let mut proxy = say_hello("Demo.GreeterProxy", true);
        proxy.tags.push(Tag::ProxyMethod {
            name: None,
            kind: TargetMethodType::Instance,
        });
        proxy
    }

    fn target_with(method: MethodDef) -> TypeDef {
        let mut ty = create_type("Demo.Greeter");
        let mut other = create_method("Demo.Greeter", "Other");
        other.token = Token::methoddef(2);
        ty.methods = vec![other, method];
        ty
    }

    #[test]
    fn equal_signature_matches() {
        let target = target_with(say_hello("Demo.Greeter", false));
        let found = MethodMatching.find_match(&proxy(), &target).unwrap();
        assert_eq!(found.name, "SayHello");
    }

    #[test]
    fn every_axis_matters() {
        let mutations: [fn(&mut MethodDef); 6] = [
            |m: &mut MethodDef| m.name = "SayGoodbye".to_string(),
            |m: &mut MethodDef| m.return_type = TypeRef::object(),
            |m: &mut MethodDef| m.params[1].ty = TypeRef::int64(),
            |m: &mut MethodDef| m.params[0].variant = ParameterVariant::Ref,
            |m: &mut MethodDef| {
                m.params.pop();
            },
            |m: &mut MethodDef| m.generic_params[0] = GenericParam::new("T"),
        ];

        for mutate in mutations {
            let mut method = say_hello("Demo.Greeter", false);
            mutate(&mut method);
            let target = target_with(method);
            let result = MethodMatching.find_match(&proxy(), &target);
            assert!(matches!(result, Err(Error::MatchNotFound { .. })));
        }
    }

    #[test]
    fn empty_parameter_lists_match() {
        let mut target = create_method("Demo.Greeter", "Reset");
        target.token = Token::methoddef(3);
        let mut proxy = create_static_method("Demo.GreeterProxy", "Reset");
        proxy.tags.push(Tag::ProxyMethod {
            name: None,
            kind: TargetMethodType::Any,
        });
        let ty = target_with(target);
        assert_eq!(
            MethodMatching.find_match(&proxy, &ty).unwrap().token,
            Token::methoddef(3)
        );
    }

    #[test]
    fn target_kind_filters_candidates() {
        let target = target_with(say_hello("Demo.Greeter", true));
        let result = MethodMatching.find_match(&proxy(), &target);
        assert!(matches!(result, Err(Error::MatchNotFound { .. })));

        let mut any = proxy();
        any.tags = vec![Tag::ProxyMethod {
            name: None,
            kind: TargetMethodType::Any,
        }];
        assert!(MethodMatching.find_match(&any, &target).is_ok());
    }

    #[test]
    fn override_name_targets_constructor() {
        let mut ctor = create_method("Demo.Greeter", ".ctor");
        ctor.params.push(Parameter::new("prefix", TypeRef::string()));
        let mut proxy = create_static_method("Demo.GreeterProxy", "Create");
        proxy.params.push(Parameter::new("prefix", TypeRef::string()));
        proxy.tags.push(Tag::ProxyMethod {
            name: Some(".ctor".to_string()),
            kind: TargetMethodType::Instance,
        });

        let target = target_with(ctor);
        assert!(MethodMatching.find_match(&proxy, &target).unwrap().is_constructor());
    }

    #[test]
    fn ambiguity_is_fatal() {
        let mut target = target_with(say_hello("Demo.Greeter", false));
        let mut twin = say_hello("Demo.Greeter", true);
        twin.token = Token::methoddef(7);
        target.methods.push(twin);

        let mut any = proxy();
        any.tags = vec![Tag::ProxyMethod {
            name: None,
            kind: TargetMethodType::Any,
        }];
        match MethodMatching.find_match(&any, &target) {
            Err(Error::AmbiguousMatch { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected an ambiguous match, got {other:?}"),
        }
    }
}
