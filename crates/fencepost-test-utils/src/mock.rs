use std::collections::VecDeque;
use std::sync::Arc;

use fencepost_core::{BatchCommand, BufferId, CompletionToken, DeviceError, GpuDevice, NativeBatch};
use parking_lot::Mutex;

use crate::store::BufferStore;
use crate::token::{Signal, SignalToken};

/// Deterministic in-memory device.
///
/// Submitted batches queue up until the test calls
/// [`complete_next`](MockDevice::complete_next) or
/// [`complete_all`](MockDevice::complete_all); only then are their
/// commands applied and their completion tokens fired, in submission
/// order. Failure injection counters make the next N calls of a kind fail.
#[derive(Default)]
pub struct MockDevice {
    store: BufferStore,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next_native: u64,
    queue: VecDeque<Submission>,
    submitted: usize,
    cancelled: usize,
    created_buffers: usize,
    fail_buffer_creations: usize,
    fail_opens: usize,
    fail_submits: usize,
    max_buffer_bytes: Option<u64>,
}

struct Submission {
    native: NativeBatch,
    commands: Vec<BatchCommand>,
    signal: Arc<Signal>,
}

impl Submission {
    fn touches(&self, buffer: BufferId) -> bool {
        self.commands.iter().any(|cmd| match cmd {
            BatchCommand::CopyBuffer { src, dst, .. } => *src == buffer || *dst == buffer,
            BatchCommand::WriteBuffer { dst, .. } => *dst == buffer,
        })
    }
}

fn take_failure(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Completion control ──────────────────────────────────────

    /// Execute and complete the oldest outstanding submission.
    ///
    /// Returns `false` if nothing was queued.
    pub fn complete_next(&self) -> bool {
        let next = self.state.lock().queue.pop_front();
        match next {
            Some(submission) => {
                for command in &submission.commands {
                    self.store.apply(command);
                }
                submission.signal.fire();
                true
            }
            None => false,
        }
    }

    /// Complete every outstanding submission. Returns how many completed.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    pub fn pending_submissions(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn submitted_batches(&self) -> usize {
        self.state.lock().submitted
    }

    pub fn cancelled_batches(&self) -> usize {
        self.state.lock().cancelled
    }

    /// Native handle of the oldest outstanding submission.
    pub fn next_pending(&self) -> Option<NativeBatch> {
        self.state.lock().queue.front().map(|s| s.native)
    }

    // ── Failure injection ───────────────────────────────────────

    pub fn fail_next_buffer_creations(&self, n: usize) {
        self.state.lock().fail_buffer_creations = n;
    }

    pub fn fail_next_opens(&self, n: usize) {
        self.state.lock().fail_opens = n;
    }

    pub fn fail_next_submits(&self, n: usize) {
        self.state.lock().fail_submits = n;
    }

    /// Reject buffer creations larger than `limit` bytes.
    pub fn set_max_buffer_bytes(&self, limit: Option<u64>) {
        self.state.lock().max_buffer_bytes = limit;
    }

    // ── Buffer inspection ───────────────────────────────────────

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.store.contents(buffer)
    }

    pub fn buffer_size(&self, buffer: BufferId) -> Option<u64> {
        self.store.size_of(buffer)
    }

    pub fn live_buffers(&self) -> usize {
        self.store.live_buffers()
    }

    pub fn created_buffers(&self) -> usize {
        self.state.lock().created_buffers
    }

    pub fn is_released(&self, buffer: BufferId) -> bool {
        self.store.is_released(buffer)
    }

    pub fn released_buffers(&self) -> Vec<BufferId> {
        self.store.released_buffers()
    }

    /// Every misuse observed so far: releasing a buffer with queued work
    /// on it, touching a released buffer, double release, out of bounds.
    pub fn violations(&self) -> Vec<String> {
        self.store.violations()
    }
}

impl GpuDevice for MockDevice {
    fn create_buffer(&self, size_bytes: u64, label: &str) -> Result<BufferId, DeviceError> {
        {
            let mut state = self.state.lock();
            if take_failure(&mut state.fail_buffer_creations) {
                return Err(DeviceError::BufferCreationFailed {
                    size_bytes,
                    reason: format!("injected failure ({label})"),
                });
            }
            if let Some(limit) = state.max_buffer_bytes.filter(|&limit| size_bytes > limit) {
                return Err(DeviceError::BufferCreationFailed {
                    size_bytes,
                    reason: format!("exceeds device limit of {limit} bytes"),
                });
            }
            state.created_buffers += 1;
        }
        Ok(self.store.create(size_bytes))
    }

    fn release_buffer(&self, buffer: BufferId) {
        let in_use = self.state.lock().queue.iter().any(|s| s.touches(buffer));
        if in_use {
            self.store
                .record_violation(format!("{buffer} released while queued work uses it"));
        }
        self.store.release(buffer);
    }

    fn open_batch(&self) -> Result<NativeBatch, DeviceError> {
        let mut state = self.state.lock();
        if take_failure(&mut state.fail_opens) {
            return Err(DeviceError::BatchUnavailable {
                reason: "injected failure".into(),
            });
        }
        state.next_native += 1;
        Ok(NativeBatch(state.next_native))
    }

    fn submit(
        &self,
        batch: NativeBatch,
        commands: Vec<BatchCommand>,
    ) -> Result<Box<dyn CompletionToken>, DeviceError> {
        let mut state = self.state.lock();
        if take_failure(&mut state.fail_submits) {
            return Err(DeviceError::SubmitFailed {
                reason: format!("injected failure ({batch})"),
            });
        }
        let signal = Signal::new();
        state.queue.push_back(Submission {
            native: batch,
            commands,
            signal: Arc::clone(&signal),
        });
        state.submitted += 1;
        Ok(Box::new(SignalToken(signal)))
    }

    fn cancel(&self, _batch: NativeBatch) -> Result<(), DeviceError> {
        self.state.lock().cancelled += 1;
        Ok(())
    }
}
