//! Criterion micro-benchmarks for region acquire/release, fence-gated
//! reuse, and grow.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use fencepost_bench::{chunk_sizes, mock_allocator};

/// Acquire and immediately release with no tracked fences: the free-list
/// fast path.
fn bench_acquire_release(c: &mut Criterion) {
    let (_device, mut alloc) = mock_allocator(1 << 20);
    let sizes = chunk_sizes(256, 1);
    c.bench_function("acquire_release_256", |b| {
        b.iter(|| {
            let mut offsets = Vec::with_capacity(sizes.len());
            for &n in &sizes {
                if let Ok(region) = alloc.acquire_region(black_box(n)) {
                    offsets.push(region.offset);
                }
            }
            for offset in offsets {
                alloc.release_region(offset).unwrap();
            }
        });
    });
}

/// Release under an outstanding fence, complete it, and reclaim on tick.
fn bench_fence_gated_reclaim(c: &mut Criterion) {
    let (device, mut alloc) = mock_allocator(1 << 20);
    let sizes = chunk_sizes(64, 2);
    c.bench_function("fence_gated_reclaim_64", |b| {
        b.iter(|| {
            let offsets: Vec<u32> = sizes
                .iter()
                .filter_map(|&n| alloc.acquire_region(n).ok())
                .map(|r| r.offset)
                .collect();
            let fence = alloc.context().acquire_batch().unwrap().submit().unwrap();
            alloc.mark_used_by(fence);
            for offset in offsets {
                alloc.release_region(offset).unwrap();
            }
            device.complete_all();
            alloc.tick();
            black_box(alloc.stats())
        });
    });
}

/// Full grow cycle: request, copy, promote, retire.
fn bench_grow(c: &mut Criterion) {
    c.bench_function("grow_4k_to_fit", |b| {
        b.iter_batched(
            || {
                let (device, mut alloc) = mock_allocator(4096);
                alloc.acquire_region(4096).unwrap();
                (device, alloc)
            },
            |(device, mut alloc)| {
                while alloc.acquire_region(black_box(1024)).is_err() {
                    device.complete_all();
                }
                alloc
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_acquire_release, bench_fence_gated_reclaim, bench_grow);
criterion_main!(benches);
