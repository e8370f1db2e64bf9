//! Union merge of in-memory modules.

use std::{collections::HashSet, sync::Arc};

use crate::{
    assembly::Operand,
    file::{MemoryStore, MergeRequest, MergeService, ModuleReader, ModuleWriter},
    metadata::{
        assign_tokens,
        customattributes::{CustomAttribute, CustomAttributeArgument},
        method::MethodRef,
        Module, TypeDef,
    },
    Error, Result,
};

/// Merges modules of a [`MemoryStore`] by taking the union of their types.
///
/// The merged module keeps the name, version and public key of the primary module. Types
/// of the other modules are appended after the primary's, the `<Module>` placeholders are
/// folded into one, every type reference that named one of the inputs becomes local, and
/// tokens are renumbered. Two inputs defining the same type are a merge failure.
#[derive(Debug, Clone)]
pub struct UnionMerge {
    store: Arc<MemoryStore>,
}

impl UnionMerge {
    /// A merger reading from and writing to `store`
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        UnionMerge { store }
    }

    fn combine(&self, primary: &Module, others: &[Module]) -> Result<Vec<TypeDef>> {
        let mut types = primary.types()?.to_vec();
        let mut names: HashSet<String> = types.iter().map(TypeDef::full_name).collect();

        for other in others {
            for ty in other.types()? {
                if ty.is_module_placeholder() {
                    if let Some(placeholder) = types.iter_mut().find(|t| t.is_module_placeholder())
                    {
                        placeholder.methods.extend(ty.methods.iter().cloned());
                        continue;
                    }
                }
                if !names.insert(ty.full_name()) {
                    return Err(Error::Merge(format!(
                        "{} is defined by both {} and {}",
                        ty.full_name(),
                        primary.name(),
                        other.name()
                    )));
                }
                types.push(ty.clone());
            }
        }

        let inputs: Vec<&str> = std::iter::once(primary.name())
            .chain(others.iter().map(Module::name))
            .collect();
        for ty in &mut types {
            localize_type(ty, &inputs);
        }
        assign_tokens(&mut types);

        Ok(types)
    }
}

impl MergeService for UnionMerge {
    fn merge(&self, request: &MergeRequest) -> Result<()> {
        let primary = self.store.read(&request.primary)?;
        let others = request
            .others
            .iter()
            .map(|path| self.store.read(path))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Merging {} module(s) into {} as {}",
            others.len(),
            primary.name(),
            request.output.display()
        );
        if !request.search_directories.is_empty() {
            log::debug!("Search directories: {:?}", request.search_directories);
        }

        let types = self.combine(&primary, &others)?;
        let mut merged = Module::from_types(primary.name(), &request.output, types)
            .map_err(|error| Error::Merge(error.to_string()))?;
        merged.set_version(primary.version());
        merged.set_public_key(primary.public_key().cloned());

        self.store
            .write(&merged, &request.output, request.signing_key.as_deref())
    }
}

fn localize_type(ty: &mut TypeDef, inputs: &[&str]) {
    localize_attributes(&mut ty.custom_attributes, inputs);
    for param in &mut ty.generic_params {
        param.constraints.iter_mut().for_each(|c| c.localize(inputs));
    }
    for property in &mut ty.properties {
        property.ty.localize(inputs);
        localize_attributes(&mut property.custom_attributes, inputs);
    }

    for method in &mut ty.methods {
        method.return_type.localize(inputs);
        method.params.iter_mut().for_each(|p| p.ty.localize(inputs));
        for param in &mut method.generic_params {
            param.constraints.iter_mut().for_each(|c| c.localize(inputs));
        }
        localize_attributes(&mut method.custom_attributes, inputs);

        let body = &mut method.body;
        body.locals.iter_mut().for_each(|l| l.ty.localize(inputs));
        for handler in &mut body.exception_handlers {
            if let Some(ty) = handler.handler.as_mut() {
                ty.localize(inputs);
            }
        }
        for instruction in &mut body.instructions {
            match &mut instruction.operand {
                Operand::Type(ty) => ty.localize(inputs),
                Operand::Method(method) => localize_method(method, inputs),
                _ => {}
            }
        }
    }
}

fn localize_method(method: &mut MethodRef, inputs: &[&str]) {
    method.declaring_type.localize(inputs);
    method.return_type.localize(inputs);
    method.parameters.iter_mut().for_each(|p| p.localize(inputs));
}

fn localize_attributes(attributes: &mut [CustomAttribute], inputs: &[&str]) {
    fn localize_argument(argument: &mut CustomAttributeArgument, inputs: &[&str]) {
        match argument {
            CustomAttributeArgument::Type(ty) => ty.localize(inputs),
            CustomAttributeArgument::Array(values) => {
                values.iter_mut().for_each(|v| localize_argument(v, inputs));
            }
            _ => {}
        }
    }

    for attribute in attributes {
        attribute
            .fixed_args
            .iter_mut()
            .for_each(|arg| localize_argument(arg, inputs));
        attribute
            .named_args
            .iter_mut()
            .for_each(|arg| localize_argument(&mut arg.value, inputs));
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        metadata::{
            customattributes::Tag,
            identity::Version,
            typesystem::{TypeRef, TypeScope},
            MethodBuilder, ModuleBuilder, TypeBuilder, MODULE_PLACEHOLDER,
        },
        test::library_ref,
    };

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            ModuleBuilder::new("Library")
                .version(Version::new(2, 0, 0, 0))
                .public_key(vec![0xAA])
                .add_type(TypeBuilder::new(MODULE_PLACEHOLDER))
                .add_type(
                    TypeBuilder::new("Demo.Greeter")
                        .public()
                        .method(MethodBuilder::new("SayHello").public()),
                )
                .build()
                .unwrap(),
        );
        store.insert(
            ModuleBuilder::new("Proxies")
                .add_type(
                    TypeBuilder::new(MODULE_PLACEHOLDER)
                        .method(MethodBuilder::new_static("Init")),
                )
                .add_type(
                    TypeBuilder::new("Demo.GreeterProxy")
                        .static_class()
                        .proxy_of(library_ref("Demo.Greeter"))
                        .method(MethodBuilder::new_static("SayHello").public().implementation(
                            |asm| {
                                asm.call(crate::metadata::MethodRef::new_instance(
                                    library_ref("Demo.Greeter"),
                                    "Other",
                                    TypeRef::void(),
                                    Vec::new(),
                                ))?
                                .ret()?;
                                Ok(())
                            },
                        )),
                )
                .build()
                .unwrap(),
        );
        store
    }

    #[test]
    fn union_keeps_primary_identity() {
        let store = store();
        UnionMerge::new(store.clone())
            .merge(&MergeRequest::new("Library.dll", "Proxies.dll", "out/Library.dll"))
            .unwrap();

        let merged = store.read(Path::new("out/Library.dll")).unwrap();
        assert_eq!(merged.name(), "Library");
        assert_eq!(merged.version(), Version::new(2, 0, 0, 0));
        assert!(merged.public_key().is_some());

        let names: Vec<String> = merged.types().unwrap().iter().map(TypeDef::full_name).collect();
        assert_eq!(names, vec![MODULE_PLACEHOLDER, "Demo.Greeter", "Demo.GreeterProxy"]);
        assert_eq!(
            merged.find_type(MODULE_PLACEHOLDER).unwrap().methods.len(),
            1
        );
    }

    #[test]
    fn references_become_local() {
        let store = store();
        UnionMerge::new(store.clone())
            .merge(&MergeRequest::new("Library.dll", "Proxies.dll", "out/Library.dll"))
            .unwrap();

        let merged = store.read(Path::new("out/Library.dll")).unwrap();
        let proxy = merged.find_type("Demo.GreeterProxy").unwrap();
        let Some(Tag::ProxyOf { target }) = proxy.tags.first() else {
            panic!("ProxyOf tag lost in merge");
        };
        assert_eq!(target.scope(), &TypeScope::Local);

        let Operand::Method(call) = &proxy.methods[0].body.instructions[0].operand else {
            panic!("expected a call");
        };
        assert_eq!(call.declaring_type.scope(), &TypeScope::Local);
    }

    #[test]
    fn tokens_are_unique() {
        let store = store();
        UnionMerge::new(store.clone())
            .merge(&MergeRequest::new("Library.dll", "Proxies.dll", "out/Library.dll"))
            .unwrap();

        let merged = store.read(Path::new("out/Library.dll")).unwrap();
        let mut tokens = HashSet::new();
        for ty in merged.types().unwrap() {
            assert!(tokens.insert(ty.token));
            for method in &ty.methods {
                assert!(tokens.insert(method.token));
            }
        }
    }

    #[test]
    fn conflicting_types() {
        let store = store();
        store.insert(
            ModuleBuilder::new("Clash")
                .add_type(TypeBuilder::new("Demo.Greeter"))
                .build()
                .unwrap(),
        );
        let result = UnionMerge::new(store.clone()).merge(&MergeRequest::new(
            "Library.dll",
            "Clash.dll",
            "out/Library.dll",
        ));
        assert!(matches!(result, Err(Error::Merge(_))));
        assert!(!store.contains(Path::new("out/Library.dll")));
    }

    #[test]
    fn missing_input() {
        let result = UnionMerge::new(store()).merge(&MergeRequest::new(
            "Library.dll",
            "Nope.dll",
            "out/Library.dll",
        ));
        assert!(matches!(result, Err(Error::FileError(_))));
    }
}
