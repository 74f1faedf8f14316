//! Segment store benchmarks.

use arbor_bench::{bench_config, random_data};
use arbor_core::SegmentStore;
use arbor_storage::{InMemoryBackend, StorageBackend};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

fn bench_backend_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_append");

    for size in [64, 1024, 16 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut backend = InMemoryBackend::new();
            let data = random_data(size);
            b.iter(|| black_box(backend.append(black_box(&data)).unwrap()));
        });
    }

    group.finish();
}

fn bench_write_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_segment");
    group.sample_size(50);

    for size in [1024, 16 * 1024, 256 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let store = SegmentStore::in_memory(bench_config()).unwrap();
            b.iter_batched(
                || random_data(size),
                |data| black_box(store.write_segment(&data).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("file", size), size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = SegmentStore::open(dir.path(), bench_config()).unwrap();
            b.iter_batched(
                || random_data(size),
                |data| black_box(store.write_segment(&data).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_read_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_segment");

    group.bench_function("cached", |b| {
        let store = SegmentStore::in_memory(bench_config()).unwrap();
        let address = store.write_segment(&random_data(4096)).unwrap();
        b.iter(|| black_box(store.read_segment(black_box(&address)).unwrap()));
    });

    group.bench_function("uncached", |b| {
        let store = SegmentStore::in_memory(bench_config().segment_cache_size(0)).unwrap();
        let address = store.write_segment(&random_data(4096)).unwrap();
        b.iter(|| black_box(store.read_segment(black_box(&address)).unwrap()));
    });

    group.finish();
}

fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    group.sample_size(20);

    for segments in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(segments), segments, |b, &segments| {
            let dir = TempDir::new().unwrap();
            {
                let store = SegmentStore::open(dir.path(), bench_config()).unwrap();
                for _ in 0..segments {
                    store.write_segment(&random_data(512)).unwrap();
                }
            }
            b.iter(|| {
                let store = SegmentStore::open(dir.path(), bench_config()).unwrap();
                black_box(store.stats().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_backend_append,
    bench_write_segment,
    bench_read_segment,
    bench_reopen
);
criterion_main!(benches);
