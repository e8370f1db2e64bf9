//! Benchmarks for matching and weaving.
//!
//! Measures the stages of the pipeline over a generated library with many methods:
//! - One matching pass over a merged module
//! - Weaving a single method pair, with and without hooks
//! - The complete in-memory pipeline

extern crate cilweave;

use std::{hint::black_box, sync::Arc};

use cilweave::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion};

const METHODS: usize = 64;

fn external(full_name: &str) -> TypeRef {
    TypeRef::class(full_name).with_scope(TypeScope::External("Library".into()))
}

fn method(builder: MethodBuilder, params: usize, value: i32) -> MethodBuilder {
    (0..params)
        .fold(builder, |builder, index| {
            builder.param(&format!("p{index}"), TypeRef::int32())
        })
        .public()
        .returns(TypeRef::int32())
        .implementation(move |asm| {
            asm.ldc_i4(value)?.ldarg_0()?.pop()?.ret()?;
            Ok(())
        })
}

fn library() -> Module {
    let ty = (0..METHODS).fold(TypeBuilder::new("Demo.Service").public(), |ty, index| {
        ty.method(method(MethodBuilder::new(&format!("Call{index}")), 3, 0))
    });
    ModuleBuilder::new("Library").add_type(ty).build().unwrap()
}

fn proxies(hooks: bool) -> Module {
    let mut ty = (0..METHODS).fold(
        TypeBuilder::new("Demo.ServiceProxy")
            .public()
            .static_class()
            .proxy_of(external("Demo.Service")),
        |ty, index| {
            ty.method(
                method(MethodBuilder::new_static(&format!("Call{index}")), 3, 1)
                    .proxy_method(TargetMethodType::Instance, None),
            )
        },
    );
    if hooks {
        ty = ty.method(
            MethodBuilder::new_static("OnEntry")
                .public()
                .param("name", TypeRef::string())
                .param("args", TypeRef::array(TypeRef::object()))
                .entry_hook(),
        );
        ty = ty.method(
            MethodBuilder::new_static("OnExit")
                .public()
                .param("name", TypeRef::string())
                .param("value", TypeRef::object())
                .exit_hook(),
        );
    }
    ModuleBuilder::new("Proxies").add_type(ty).build().unwrap()
}

fn store(hooks: bool) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert(library());
    store.insert(proxies(hooks));
    store
}

fn merged() -> Module {
    let store = store(false);
    UnionMerge::new(store.clone())
        .merge(&MergeRequest::new("Library.dll", "Proxies.dll", "Merged.dll"))
        .unwrap();
    store.read(std::path::Path::new("Merged.dll")).unwrap()
}

/// Benchmark one matching pass over the merged module.
fn bench_browse(c: &mut Criterion) {
    let module = merged();

    c.bench_function("browse_64_methods", |b| {
        b.iter(|| {
            let matches = browse(black_box(&module)).unwrap();
            black_box(matches)
        });
    });
}

/// Benchmark weaving a single pair into a fresh destination.
fn bench_weave_pair(c: &mut Criterion) {
    let target = library().find_type("Demo.Service").unwrap().methods[0].clone();

    for hooks in [false, true] {
        let proxy_module = proxies(hooks);
        let proxy_type = proxy_module.find_type("Demo.ServiceProxy").unwrap();
        let weaver = Weaver::new(proxy_type).unwrap();
        let proxy = proxy_type.methods[0].clone();

        let name = if hooks { "weave_pair_hooks" } else { "weave_pair" };
        c.bench_function(name, |b| {
            b.iter(|| {
                let mut destination = target.clone();
                weaver.weave(&mut destination, black_box(&proxy)).unwrap();
                black_box(destination)
            });
        });
    }
}

/// Benchmark the complete pipeline for one pair.
fn bench_tamper(c: &mut Criterion) {
    let tampering = Tampering::in_memory(store(true));
    let pair = ModulePair::new("Proxies.dll", "Library.dll");

    c.bench_function("tamper_64_methods", |b| {
        b.iter(|| {
            let woven = tampering.tamper(black_box(&pair)).unwrap();
            black_box(woven)
        });
    });
}

criterion_group!(benches, bench_browse, bench_weave_pair, bench_tamper);
criterion_main!(benches);
