//! Benchmarks for BlockKV storage operations

use blockkv::Store;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;

const FILE_SIZE: u32 = 1024 * 1024;

fn storage_benchmarks(c: &mut Criterion) {
    // Single key overwrite (space reused every time)
    c.bench_function("upsert_overwrite_1k", |b| {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open_path(temp.path(), FILE_SIZE).unwrap();
        let value = vec![7u8; 1024];
        b.iter(|| store.upsert(black_box(b"key"), black_box(&value)).unwrap());
    });

    // Fresh keys, values spanning several backing files
    c.bench_function("upsert_fresh_64k", |b| {
        let value = vec![3u8; 64 * 1024];
        b.iter_batched(
            || {
                let temp = TempDir::new().unwrap();
                let store = Store::open_path(temp.path(), 16 * 1024).unwrap();
                (temp, store)
            },
            |(_temp, mut store)| {
                for i in 0..16u32 {
                    store.upsert(&i.to_be_bytes(), &value).unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });

    // Point reads
    c.bench_function("load_1k", |b| {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open_path(temp.path(), FILE_SIZE).unwrap();
        for i in 0..1000u32 {
            store.upsert(&i.to_be_bytes(), &[i as u8; 1024]).unwrap();
        }
        let mut i = 0u32;
        b.iter(|| {
            i = (i + 1) % 1000;
            black_box(store.load(&i.to_be_bytes()).unwrap())
        });
    });
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
