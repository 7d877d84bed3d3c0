use std::sync::Arc;
use std::time::{Duration, Instant};

use fencepost_core::CompletionToken;
use parking_lot::{Condvar, Mutex};

/// One-shot completion flag that waiters can block on.
#[derive(Default)]
pub struct Signal {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fire(&self) {
        *self.fired.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.lock()
    }
}

/// Completion token backed by a [`Signal`].
pub struct SignalToken(pub Arc<Signal>);

impl CompletionToken for SignalToken {
    fn is_complete(&self) -> bool {
        self.0.is_fired()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.0.fired.lock();
        while !*fired {
            if self.0.cond.wait_until(&mut fired, deadline).timed_out() {
                break;
            }
        }
        *fired
    }
}
