//! Terrain mesh streaming over a sub-allocated vertex buffer.
//!
//! Demonstrates: acquire regions for new chunks → upload through a batch →
//! draw with the buffer marked in use → unload chunks → retry uploads that
//! hit a grow on later frames. The mock GPU lags two frames behind.

use std::collections::VecDeque;

use fencepost_arena::Region;
use fencepost_bench::{chunk_sizes, mock_allocator, VERTEX_SIZE};

const FRAMES: usize = 120;
const GPU_LAG_FRAMES: usize = 2;

fn main() {
    fencepost_test_utils::init_test_logging();
    println!("=== fencepost mesh streaming example ===\n");

    let (device, mut alloc) = mock_allocator(4096);
    let sizes = chunk_sizes(FRAMES * 4, 7);
    let mut incoming: VecDeque<u32> = sizes.into_iter().collect();
    let mut resident: VecDeque<Region> = VecDeque::new();
    let mut submissions_per_frame: VecDeque<usize> = VecDeque::new();
    let mut retries = 0usize;

    for frame in 0..FRAMES {
        let before = device.submitted_batches();
        alloc.tick();

        // Stream in up to four chunks; anything that does not fit waits.
        for _ in 0..4 {
            let Some(&vertices) = incoming.front() else { break };
            match alloc.acquire_region(vertices) {
                Ok(region) => {
                    incoming.pop_front();
                    let Some(buffer) = alloc.buffer() else { break };
                    let mut upload = alloc.context().acquire_batch().unwrap();
                    upload.write_buffer(
                        buffer,
                        region.byte_offset(VERTEX_SIZE),
                        vec![(frame % 251) as u8; region.byte_len(VERTEX_SIZE) as usize],
                    );
                    alloc.mark_uploaded_by_batch(&upload);
                    upload.submit_detached();
                    resident.push_back(region);
                }
                Err(e) if e.is_transient() => {
                    retries += 1;
                    break;
                }
                Err(e) => {
                    println!("frame {frame}: dropping chunk of {vertices} vertices: {e}");
                    incoming.pop_front();
                }
            }
        }

        // Unload the oldest chunks once enough are resident.
        while resident.len() > 48 {
            if let Some(region) = resident.pop_front() {
                alloc.release_region(region.offset).unwrap();
            }
        }

        // Draw everything resident this frame.
        let draw = alloc.context().acquire_batch().unwrap();
        alloc.mark_used_by_batch(&draw);
        draw.submit_detached();

        // The GPU finishes work submitted GPU_LAG_FRAMES frames ago.
        submissions_per_frame.push_back(device.submitted_batches() - before);
        if submissions_per_frame.len() > GPU_LAG_FRAMES {
            for _ in 0..submissions_per_frame.pop_front().unwrap_or(0) {
                device.complete_next();
            }
        }

        if frame % 20 == 19 {
            let stats = alloc.stats();
            println!(
                "frame {:>3}: size {:>6} vertices ({:>8} bytes), {:>2} chunks, {:>5.1}% used, \
                 {} pending, {} free regions, resizing: {}",
                frame + 1,
                stats.size_elements,
                stats.size_bytes,
                stats.allocations,
                stats.utilization() * 100.0,
                stats.pending_releases,
                stats.free_regions,
                stats.resize_in_progress,
            );
        }
    }

    device.complete_all();
    alloc.tick();
    println!("\n{retries} uploads deferred by grows, {} chunks never loaded", incoming.len());
    println!("final: {:?}", alloc.stats());
}
