//! Benchmark profiles and utilities for the fencepost sub-allocator.
//!
//! - [`mock_allocator`]: an allocator over a manually completed [`MockDevice`]
//! - [`chunk_sizes`]: deterministic mesh-chunk size distribution via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use fencepost_arena::{SubBufferAllocator, SubBufferConfig};
use fencepost_sync::{ContextConfig, ExecutionContext};
use fencepost_test_utils::MockDevice;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Bytes per vertex in the streaming profile.
pub const VERTEX_SIZE: u32 = 16;

/// Build an allocator of `initial_elements` vertices (alignment 4) over a
/// fresh [`MockDevice`].
pub fn mock_allocator(initial_elements: u32) -> (Arc<MockDevice>, SubBufferAllocator) {
    let device = Arc::new(MockDevice::new());
    let ctx = ExecutionContext::new(device.clone(), ContextConfig::default())
        .expect("default context config is valid");
    let config = SubBufferConfig {
        label: "bench-vertices".into(),
        ..SubBufferConfig::new(VERTEX_SIZE, initial_elements, 4)
    };
    let alloc = SubBufferAllocator::new(ctx, config).expect("bench allocator config is valid");
    (device, alloc)
}

/// `count` chunk sizes in vertices, skewed towards small chunks the way
/// terrain meshes are: most chunks are sparse, a few are dense.
pub fn chunk_sizes(count: usize, seed: u64) -> Vec<u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let roll = rng.next_u32() % 100;
            let max = match roll {
                0..=69 => 256,
                70..=94 => 2_048,
                _ => 16_384,
            };
            rng.next_u32() % max + 1
        })
        .collect()
}
