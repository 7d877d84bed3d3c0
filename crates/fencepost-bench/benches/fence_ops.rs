//! Criterion micro-benchmarks for fence lifetime, batch round trips, and
//! registry lookup.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use fencepost_sync::{wait, ContextConfig, ExecutionContext, WaitMode};
use fencepost_test_utils::MockDevice;

fn context() -> (Arc<MockDevice>, Arc<ExecutionContext>) {
    let device = Arc::new(MockDevice::new());
    let ctx = ExecutionContext::new(device.clone(), ContextConfig::default()).unwrap();
    (device, ctx)
}

fn bench_fence_lifetime(c: &mut Criterion) {
    let (_device, ctx) = context();
    c.bench_function("fence_create_ref_release", |b| {
        b.iter(|| {
            let fence = ctx.create_fence().unwrap();
            fence.add_destruction_callback(|| {});
            let extra = fence.clone();
            black_box(extra.ref_count());
        });
    });
}

fn bench_batch_round_trip(c: &mut Criterion) {
    let (device, ctx) = context();
    c.bench_function("batch_acquire_submit_complete", |b| {
        b.iter(|| {
            let fence = ctx.acquire_batch().unwrap().submit().unwrap();
            device.complete_next();
            wait(&[fence], WaitMode::All, None).unwrap();
        });
    });
}

fn bench_registry_lookup(c: &mut Criterion) {
    let (_device, ctx) = context();
    let batches: Vec<_> = (0..1024).map(|_| ctx.acquire_batch().unwrap()).collect();
    let ids: Vec<_> = batches.iter().map(|b| b.id()).collect();
    c.bench_function("batch_fence_lookup_1024", |b| {
        b.iter(|| {
            for &id in &ids {
                black_box(ctx.batch_fence(id));
            }
        });
    });
    for batch in batches {
        batch.cancel().unwrap();
    }
}

criterion_group!(benches, bench_fence_lifetime, bench_batch_round_trip, bench_registry_lookup);
criterion_main!(benches);
