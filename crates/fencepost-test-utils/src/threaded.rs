use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use fencepost_core::{BatchCommand, BufferId, CompletionToken, DeviceError, GpuDevice, NativeBatch};

use crate::store::BufferStore;
use crate::token::{Signal, SignalToken};

struct Job {
    commands: Vec<BatchCommand>,
    signal: Arc<Signal>,
}

/// Device whose queue runs on a background thread.
///
/// Each submission is executed in order after `latency`, then its token
/// fires. Dropping the device drains the queue and joins the thread.
pub struct ThreadedDevice {
    store: Arc<BufferStore>,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    next_native: AtomicU64,
    cancelled: AtomicUsize,
}

impl ThreadedDevice {
    pub fn new(latency: Duration) -> Self {
        let store = Arc::new(BufferStore::new());
        let (sender, receiver) = unbounded::<Job>();
        let worker_store = Arc::clone(&store);
        let worker = thread::Builder::new()
            .name("fencepost-queue".into())
            .spawn(move || {
                for job in receiver {
                    thread::sleep(latency);
                    for command in &job.commands {
                        worker_store.apply(command);
                    }
                    job.signal.fire();
                }
            })
            .expect("failed to spawn queue thread");
        Self {
            store,
            sender: Some(sender),
            worker: Some(worker),
            next_native: AtomicU64::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.store.contents(buffer)
    }

    pub fn live_buffers(&self) -> usize {
        self.store.live_buffers()
    }

    pub fn cancelled_batches(&self) -> usize {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn violations(&self) -> Vec<String> {
        self.store.violations()
    }
}

impl GpuDevice for ThreadedDevice {
    fn create_buffer(&self, size_bytes: u64, _label: &str) -> Result<BufferId, DeviceError> {
        Ok(self.store.create(size_bytes))
    }

    fn release_buffer(&self, buffer: BufferId) {
        self.store.release(buffer);
    }

    fn open_batch(&self) -> Result<NativeBatch, DeviceError> {
        Ok(NativeBatch(self.next_native.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn submit(
        &self,
        _batch: NativeBatch,
        commands: Vec<BatchCommand>,
    ) -> Result<Box<dyn CompletionToken>, DeviceError> {
        let sender = self.sender.as_ref().ok_or(DeviceError::DeviceLost)?;
        let signal = Signal::new();
        sender
            .send(Job {
                commands,
                signal: Arc::clone(&signal),
            })
            .map_err(|_| DeviceError::DeviceLost)?;
        Ok(Box::new(SignalToken(signal)))
    }

    fn cancel(&self, _batch: NativeBatch) -> Result<(), DeviceError> {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for ThreadedDevice {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
