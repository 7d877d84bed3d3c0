//! Buffer contents survive grows.

use std::sync::Arc;

use fencepost_arena::{Region, SubBufferAllocator, SubBufferConfig};
use fencepost_sync::{ContextConfig, ExecutionContext};
use fencepost_test_utils::MockDevice;

const ELEMENT_SIZE: u32 = 4;

fn upload(alloc: &mut SubBufferAllocator, region: Region, byte: u8) {
    let buffer = alloc.buffer().unwrap();
    let mut batch = alloc.context().acquire_batch().unwrap();
    batch.write_buffer(
        buffer,
        region.byte_offset(ELEMENT_SIZE),
        vec![byte; region.byte_len(ELEMENT_SIZE) as usize],
    );
    alloc.mark_uploaded_by_batch(&batch);
    assert!(batch.submit_detached());
}

fn read(device: &MockDevice, alloc: &SubBufferAllocator, region: Region) -> Vec<u8> {
    let bytes = device.buffer_contents(alloc.buffer().unwrap()).unwrap();
    let start = region.byte_offset(ELEMENT_SIZE) as usize;
    bytes[start..start + region.byte_len(ELEMENT_SIZE) as usize].to_vec()
}

#[test]
fn contents_and_offsets_survive_repeated_grows() {
    let device = Arc::new(MockDevice::new());
    let ctx = ExecutionContext::new(device.clone(), ContextConfig::default()).unwrap();
    let mut alloc = SubBufferAllocator::new(ctx, SubBufferConfig::new(ELEMENT_SIZE, 8, 4)).unwrap();

    let mut written = Vec::new();
    let mut sizes = Vec::new();
    for i in 0..12u8 {
        let region = loop {
            match alloc.acquire_region(u32::from(i % 5) + 1) {
                Ok(region) => break region,
                Err(e) => {
                    assert!(e.is_transient(), "{e}");
                    device.complete_all();
                }
            }
        };
        upload(&mut alloc, region, i + 1);
        written.push((region, i + 1));
        if sizes.last() != Some(&alloc.size()) {
            sizes.push(alloc.size());
        }
    }
    device.complete_all();
    alloc.tick();

    assert!(sizes.len() > 2, "expected several grows, saw sizes {sizes:?}");
    for (region, byte) in &written {
        assert_eq!(alloc.allocation(region.offset), Some(*region));
        assert_eq!(read(&device, &alloc, *region), vec![*byte; region.byte_len(ELEMENT_SIZE) as usize]);
    }

    // Only the current buffer remains once every grow has settled.
    assert_eq!(alloc.stats().retired_buffers, 0);
    assert_eq!(device.live_buffers(), 1);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn pending_upload_delays_copy_until_written() {
    let device = Arc::new(MockDevice::new());
    let ctx = ExecutionContext::new(device.clone(), ContextConfig::default()).unwrap();
    let mut alloc = SubBufferAllocator::new(ctx, SubBufferConfig::new(ELEMENT_SIZE, 8, 4)).unwrap();

    let region = alloc.acquire_region(8).unwrap();
    upload(&mut alloc, region, 0xAB);

    // Needs a grow, but the upload is still queued.
    assert!(alloc.acquire_region(4).is_err());
    assert_eq!(alloc.stats().upload_fences, 1);
    assert_eq!(device.pending_submissions(), 1);

    device.complete_all();
    alloc.tick();
    device.complete_all();
    alloc.acquire_region(4).unwrap();

    assert_eq!(read(&device, &alloc, region), vec![0xAB; 32]);
}
