//! Node type registry benchmarks.

use arbor_bench::{bench_config, generated_cnd};
use arbor_core::{check_compatibility, cnd, Repository};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cnd_parse");

    for count in [10, 100].iter() {
        let text = generated_cnd(*count, 10);
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| black_box(cnd::parse_document(black_box(text)).unwrap()));
        });
    }

    group.finish();
}

fn bench_compatibility(c: &mut Criterion) {
    let old = cnd::parse(&generated_cnd(1, 50)).unwrap().remove(0);
    let mut new = old.clone();
    for prop in &mut new.properties {
        prop.mandatory = false;
    }
    c.bench_function("check_compatibility", |b| {
        b.iter(|| black_box(check_compatibility(black_box(&old), black_box(&new))));
    });
}

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("register");
    group.sample_size(20);

    group.bench_function("builtins", |b| {
        b.iter(|| black_box(Repository::in_memory(bench_config()).unwrap()));
    });

    group.bench_function("reregister_unchanged", |b| {
        let repo = Repository::in_memory(bench_config()).unwrap();
        let text = generated_cnd(20, 5);
        cnd::import(repo.registry(), &text, false).unwrap();
        b.iter(|| black_box(cnd::import(repo.registry(), &text, true).unwrap()));
    });

    group.bench_function("lookup", |b| {
        let repo = Repository::in_memory(bench_config()).unwrap();
        b.iter(|| black_box(repo.registry().lookup(black_box("nt:file")).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_compatibility, bench_register);
criterion_main!(benches);
