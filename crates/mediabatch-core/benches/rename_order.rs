//! Benchmarks for rename order resolution.
//!
//! Run with: cargo bench -p mediabatch-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mediabatch_core::rename::{RenameRequest, RenameResolver};
use std::path::PathBuf;

/// Every file moves one slot up, so each rename waits on the next one.
fn shifted_chain(len: usize) -> Vec<RenameRequest<usize>> {
    (0..len)
        .map(|i| RenameRequest {
            key: i,
            source: PathBuf::from(format!("/photos/IMG_{i:06}.jpg")),
            destination: PathBuf::from(format!("/photos/IMG_{:06}.jpg", i + 1)),
        })
        .collect()
}

/// Renames into a fresh naming scheme with no dependencies.
fn independent(len: usize) -> Vec<RenameRequest<usize>> {
    (0..len)
        .map(|i| RenameRequest {
            key: i,
            source: PathBuf::from(format!("/photos/IMG_{i:06}.jpg")),
            destination: PathBuf::from(format!("/photos/Trip {i:05}.jpg")),
        })
        .collect()
}

fn benchmark_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("rename_order");
    for len in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("chain", len), &len, |b, &len| {
            b.iter_batched(
                || shifted_chain(len),
                |requests| RenameResolver::new(black_box(requests), |_| false).resolve(),
                criterion::BatchSize::LargeInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("independent", len), &len, |b, &len| {
            b.iter_batched(
                || independent(len),
                |requests| RenameResolver::new(black_box(requests), |_| false).resolve(),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_resolve);
criterion_main!(benches);
