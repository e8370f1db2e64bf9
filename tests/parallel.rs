//! Independent pairs processed in parallel through `Tampering::tamper_all`.

use std::{path::PathBuf, sync::Arc};

use cilweave::prelude::*;

fn library(name: &str, value: i32) -> Result<Module> {
    ModuleBuilder::new(name)
        .add_type(
            TypeBuilder::new("Demo.Clock").public().method(
                MethodBuilder::new_static("Ticks")
                    .public()
                    .returns(TypeRef::int32())
                    .implementation(move |asm| {
                        asm.ldc_i4(value)?.ret()?;
                        Ok(())
                    }),
            ),
        )
        .build()
}

fn proxies(name: &str, target: &str, value: i32) -> Result<Module> {
    ModuleBuilder::new(name)
        .add_type(
            TypeBuilder::new("Demo.ClockProxy")
                .public()
                .static_class()
                .proxy_of(TypeRef::class("Demo.Clock").with_scope(TypeScope::External(target.into())))
                .method(
                    MethodBuilder::new_static("Ticks")
                        .public()
                        .returns(TypeRef::int32())
                        .proxy_method(TargetMethodType::Static, None)
                        .implementation(move |asm| {
                            asm.ldc_i4(value)?.ret()?;
                            Ok(())
                        }),
                ),
        )
        .build()
}

fn ticks(module: &Module) -> Result<EmValue> {
    let method = module.find_type("Demo.Clock")?.methods[0].reference();
    Interpreter::new(module)?.invoke(&method, Vec::new())
}

#[test]
fn test_tamper_all() -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let output = tempfile::tempdir()?;

    let store = Arc::new(MemoryStore::new());
    let mut jobs = Vec::new();
    for index in 0..8 {
        let library_name = format!("Library{index}");
        let proxies_name = format!("Proxies{index}");
        store.insert(library(&library_name, index)?);
        store.insert(proxies(&proxies_name, &library_name, 100 + index)?);
        jobs.push((
            ModulePair::new(format!("{proxies_name}.dll"), format!("{library_name}.dll")),
            output.path().join(format!("{library_name}.dll")),
        ));
    }
    // a pair whose proxy is missing fails on its own
    jobs.push((
        ModulePair::new("Missing.dll", "Library0.dll"),
        output.path().join("Broken.dll"),
    ));

    let tampering = Tampering::in_memory(store.clone())
        .with_options(TamperingOptions::new().scratch_directory(scratch.path()));
    let results = tampering.tamper_all(&jobs);

    assert_eq!(results.len(), jobs.len());
    for (index, (result, (_, destination))) in results.iter().zip(&jobs).take(8).enumerate() {
        assert!(result.is_ok(), "pair {index} failed: {result:?}");
        let woven = store.read(destination)?;
        assert_eq!(ticks(&woven)?, EmValue::I32(100 + index as i32));
    }
    assert!(matches!(results.last(), Some(Err(Error::FileError(_)))));
    assert!(!store.contains(&output.path().join("Broken.dll")));

    // merged modules land in per-pair scratch directories
    let merged: PathBuf = tampering.scratch_path(&jobs[3].0)?;
    assert!(merged.starts_with(scratch.path()));
    assert!(store.contains(&merged));
    Ok(())
}

#[test]
fn test_equal_file_names_in_different_directories() -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let store = Arc::new(MemoryStore::new());

    let mut jobs = Vec::new();
    for index in 0..32 {
        let directory = PathBuf::from(format!("d{index}"));
        let mut target = library("Library", index)?;
        target.set_path(directory.join("Library.dll"));
        let mut proxy = proxies("Proxies", "Library", 1000 + index)?;
        proxy.set_path(directory.join("Proxies.dll"));
        store.insert(target);
        store.insert(proxy);

        jobs.push((
            ModulePair::new(directory.join("Proxies.dll"), directory.join("Library.dll")),
            directory.join("out").join("Library.dll"),
        ));
    }

    let tampering = Tampering::in_memory(store.clone())
        .with_options(TamperingOptions::new().scratch_directory(scratch.path()));
    for round in 0..4 {
        for result in tampering.tamper_all(&jobs) {
            result?;
        }
        for (index, (pair, destination)) in jobs.iter().enumerate() {
            assert_eq!(
                ticks(&store.read(destination)?)?,
                EmValue::I32(1000 + index as i32),
                "round {round}: {} received another pair's proxy",
                destination.display()
            );
            let neighbour = &jobs[(index + 1) % jobs.len()].0;
            assert_ne!(tampering.scratch_path(pair)?, tampering.scratch_path(neighbour)?);
        }
    }
    Ok(())
}
