//! Node store benchmarks.

use arbor_bench::populated_store;
use arbor_core::{ConflictPolicy, EmptyHook, PropertyState};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_single_property_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_one_property");

    for width in [10, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
            let store = populated_store(width);
            let mut n = 0i64;
            b.iter(|| {
                n += 1;
                store
                    .edit(|root| {
                        root.at_path_or_create("/items/item0")?
                            .set_property("counter", PropertyState::long(n));
                        Ok(())
                    })
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_rebase(c: &mut Criterion) {
    c.bench_function("commit_after_rebase", |b| {
        let store = populated_store(100);
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            let base = store.current_root().unwrap();
            let mut builder = store.builder(&base);
            builder
                .at_path_or_create("/items/item1")
                .unwrap()
                .set_property("mine", PropertyState::long(n));

            store
                .edit(|root| {
                    root.at_path_or_create("/items/item2")?
                        .set_property("theirs", PropertyState::long(n));
                    Ok(())
                })
                .unwrap();

            black_box(store.commit(&builder, ConflictPolicy::Fail, &EmptyHook).unwrap())
        });
    });
}

fn bench_read_path(c: &mut Criterion) {
    let store = populated_store(1000);
    let root = store.current_root().unwrap();
    c.bench_function("node_at", |b| {
        b.iter(|| black_box(root.node_at(black_box("/items/item500")).unwrap()));
    });
}

criterion_group!(benches, bench_single_property_commit, bench_rebase, bench_read_path);
criterion_main!(benches);
