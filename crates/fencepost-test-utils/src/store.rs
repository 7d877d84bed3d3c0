use std::collections::{HashMap, HashSet};

use fencepost_core::{BatchCommand, BufferId};
use parking_lot::Mutex;

/// Byte-accurate backing memory for mock devices.
///
/// Buffers are zero-initialised. Touching a released buffer, releasing a
/// buffer twice, or writing out of bounds is recorded as a violation
/// instead of panicking, so tests can assert on it after the fact.
#[derive(Default)]
pub struct BufferStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    live: HashMap<BufferId, Vec<u8>>,
    released: HashSet<BufferId>,
    violations: Vec<String>,
}

impl StoreInner {
    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    fn check_range(&mut self, buffer: BufferId, offset: u64, size: u64) -> bool {
        let Some(len) = self.live.get(&buffer).map(|b| b.len() as u64) else {
            let kind = if self.released.contains(&buffer) {
                "released"
            } else {
                "unknown"
            };
            self.violation(format!("access to {kind} {buffer}"));
            return false;
        };
        if offset.checked_add(size).is_none_or(|end| end > len) {
            self.violation(format!(
                "out-of-bounds access to {buffer}: {offset}+{size} > {len}"
            ));
            return false;
        }
        true
    }
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, size_bytes: u64) -> BufferId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = BufferId(inner.next_id);
        inner.live.insert(id, vec![0; size_bytes as usize]);
        id
    }

    pub fn release(&self, buffer: BufferId) {
        let mut inner = self.inner.lock();
        if inner.live.remove(&buffer).is_some() {
            inner.released.insert(buffer);
        } else if inner.released.contains(&buffer) {
            inner.violation(format!("double release of {buffer}"));
        } else {
            inner.violation(format!("release of unknown {buffer}"));
        }
    }

    /// Record a violation found by a device wrapping this store.
    pub fn record_violation(&self, message: String) {
        self.inner.lock().violation(message);
    }

    /// Execute one command against the stored bytes.
    pub fn apply(&self, command: &BatchCommand) {
        let mut inner = self.inner.lock();
        match command {
            BatchCommand::WriteBuffer { dst, offset, data } => {
                if !inner.check_range(*dst, *offset, data.len() as u64) {
                    return;
                }
                if let Some(bytes) = inner.live.get_mut(dst) {
                    let start = *offset as usize;
                    bytes[start..start + data.len()].copy_from_slice(data);
                }
            }
            BatchCommand::CopyBuffer {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            } => {
                if !inner.check_range(*src, *src_offset, *size)
                    || !inner.check_range(*dst, *dst_offset, *size)
                {
                    return;
                }
                let (from, to, len) = (*src_offset as usize, *dst_offset as usize, *size as usize);
                if src == dst {
                    if let Some(bytes) = inner.live.get_mut(dst) {
                        bytes.copy_within(from..from + len, to);
                    }
                } else {
                    let chunk = inner
                        .live
                        .get(src)
                        .map(|bytes| bytes[from..from + len].to_vec());
                    if let (Some(chunk), Some(bytes)) = (chunk, inner.live.get_mut(dst)) {
                        bytes[to..to + len].copy_from_slice(&chunk);
                    }
                }
            }
        }
    }

    pub fn contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.inner.lock().live.get(&buffer).cloned()
    }

    pub fn size_of(&self, buffer: BufferId) -> Option<u64> {
        self.inner.lock().live.get(&buffer).map(|b| b.len() as u64)
    }

    pub fn live_buffers(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn is_released(&self, buffer: BufferId) -> bool {
        self.inner.lock().released.contains(&buffer)
    }

    pub fn released_buffers(&self) -> Vec<BufferId> {
        let mut released: Vec<_> = self.inner.lock().released.iter().copied().collect();
        released.sort();
        released
    }

    pub fn violations(&self) -> Vec<String> {
        self.inner.lock().violations.clone()
    }
}
