//! Hashing and planning benchmarks for mirror-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mirror_core::{hash_bytes, hash_file, plan, DigestCache, DirectHasher, EntryKind, Snapshot};
use std::path::PathBuf;

fn bench_hash_operations(c: &mut Criterion) {
    let small = vec![0x5Au8; 512];
    let large = vec![0xABu8; 4 * 1024 * 1024];

    c.bench_function("hash_bytes_small", |b| {
        b.iter(|| black_box(hash_bytes(black_box(&small))))
    });

    c.bench_function("hash_bytes_large", |b| {
        b.iter(|| black_box(hash_bytes(black_box(&large))))
    });

    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("large.bin");
    std::fs::write(&path, &large).unwrap();

    c.bench_function("hash_file_4mb", |b| {
        b.iter(|| black_box(hash_file(&path).unwrap()))
    });

    let mut cache = DigestCache::new();
    c.bench_function("digest_cache_hit_4mb", |b| {
        b.iter(|| black_box(cache.get_or_hash(&path).unwrap()))
    });
}

/// Wide synthetic tree: `dirs` directories with `files` files each
fn synthetic(root: &str, dirs: usize, files: usize) -> Snapshot {
    let mut entries: Vec<(PathBuf, EntryKind)> = Vec::with_capacity(dirs * (files + 1));
    for d in 0..dirs {
        let dir = PathBuf::from(format!("dir{:04}", d));
        for f in 0..files {
            entries.push((dir.join(format!("file{:04}.txt", f)), EntryKind::File));
        }
        entries.push((dir, EntryKind::Dir));
    }
    Snapshot::from_entries(root, entries)
}

fn bench_plan(c: &mut Criterion) {
    let origin = synthetic("/bench/origin", 100, 100);
    let empty = Snapshot::from_entries("/bench/replica", Vec::<(PathBuf, EntryKind)>::new());

    c.bench_function("plan_first_run_10k", |b| {
        b.iter(|| black_box(plan(&origin, &empty, &mut DirectHasher)))
    });

    c.bench_function("plan_full_delete_10k", |b| {
        b.iter(|| black_box(plan(&empty, &origin, &mut DirectHasher)))
    });
}

criterion_group!(benches, bench_hash_operations, bench_plan);
criterion_main!(benches);
