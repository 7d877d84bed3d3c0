//! Reference-counted completion fences.
//!
//! A [`Fence`] is a shared handle: `clone()` adds a holder and dropping
//! (or [`release`](Fence::release)) removes one. The backing state is
//! destroyed exactly once, when the last holder goes away, and at that
//! point every destruction callback fires.
//!
//! State only moves forward:
//!
//! ```text
//! Pending ──submit──▶ Submitted ──token completes──▶ Done
//!    └─────cancel───▶ Cancelled
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use fencepost_core::{BatchId, CompletionToken, FenceError};
use parking_lot::Mutex;

const STATE_PENDING: u8 = 0;
const STATE_SUBMITTED: u8 = 1;
const STATE_CANCELLED: u8 = 2;

/// Callback fired once when a fence is destroyed.
pub type DestructionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Observable state of a fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    /// The owning batch is still recording.
    Pending,
    /// Submitted, but the GPU has not finished (or submission produced
    /// no completion token, in which case it never will).
    Submitted,
    /// Submitted and the GPU has finished.
    Done,
    /// The owning batch was aborted before executing anything.
    Cancelled,
}

/// Live-fence accounting shared by every fence of one context.
///
/// Stands in for the pool of native completion primitives: each live
/// fence holds one reservation, returned when the fence is destroyed.
pub(crate) struct FenceDomain {
    live: AtomicUsize,
    limit: usize,
    poll_interval: Duration,
}

impl FenceDomain {
    pub(crate) fn new(limit: usize, poll_interval: Duration) -> Self {
        Self {
            live: AtomicUsize::new(0),
            limit,
            poll_interval,
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn reserve(&self) -> Result<(), FenceError> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|live| FenceError::PrimitiveExhausted {
                live,
                limit: self.limit,
            })
    }

    fn unreserve(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

struct FenceShared {
    batch: Option<BatchId>,
    state: AtomicU8,
    token: OnceLock<Box<dyn CompletionToken>>,
    callbacks: Mutex<Vec<DestructionCallback>>,
    domain: Arc<FenceDomain>,
}

impl Drop for FenceShared {
    fn drop(&mut self) {
        for callback in std::mem::take(self.callbacks.get_mut()) {
            callback();
        }
        self.domain.unreserve();
    }
}

/// Shared handle to the eventual completion of one batch of GPU work.
///
/// Cloning is the "ref" operation and dropping is "release". A fence is
/// never destroyed while any clone is alive.
#[derive(Clone)]
pub struct Fence {
    shared: Arc<FenceShared>,
}

// Compile-time assertion: Fence must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Fence>();
};

impl Fence {
    /// Create a pending fence with one holder, reserving a primitive from
    /// `domain`.
    pub(crate) fn create(domain: &Arc<FenceDomain>, batch: Option<BatchId>) -> Result<Self, FenceError> {
        domain.reserve()?;
        Ok(Self {
            shared: Arc::new(FenceShared {
                batch,
                state: AtomicU8::new(STATE_PENDING),
                token: OnceLock::new(),
                callbacks: Mutex::new(Vec::new()),
                domain: Arc::clone(domain),
            }),
        })
    }

    /// The batch this fence was created for, if any.
    pub fn batch(&self) -> Option<BatchId> {
        self.shared.batch
    }

    /// Number of live holders, including `self`.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Drop this holder's reference.
    ///
    /// Equivalent to `drop(fence)`; spelled out for call sites where the
    /// release is the point. May run destruction callbacks.
    pub fn release(self) {
        drop(self);
    }

    /// Register a callback to run when the last holder releases the fence.
    ///
    /// Callbacks run exactly once each, in unspecified order, on the thread
    /// that drops the last reference. They must not depend on each other.
    pub fn add_destruction_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.callbacks.lock().push(Box::new(callback));
    }

    /// Current state. `Done` is only reported once the completion token
    /// confirms the GPU has finished.
    pub fn status(&self) -> FenceStatus {
        match self.shared.state.load(Ordering::Acquire) {
            STATE_PENDING => FenceStatus::Pending,
            STATE_CANCELLED => FenceStatus::Cancelled,
            _ => match self.shared.token.get() {
                Some(token) if token.is_complete() => FenceStatus::Done,
                _ => FenceStatus::Submitted,
            },
        }
    }

    /// Whether the work was submitted and has completed.
    ///
    /// A cancelled fence is never done; check [`is_cancelled`](Self::is_cancelled)
    /// to tell aborted work from finished work.
    pub fn is_done(&self) -> bool {
        self.status() == FenceStatus::Done
    }

    /// Whether the owning batch was aborted before any work executed.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_CANCELLED
    }

    /// Done or cancelled: nothing tracked by this fence can still touch
    /// GPU memory.
    pub fn is_settled(&self) -> bool {
        matches!(self.status(), FenceStatus::Done | FenceStatus::Cancelled)
    }

    /// Whether submission produced a completion token.
    ///
    /// A submitted fence without a token never becomes done.
    pub fn has_completion_token(&self) -> bool {
        self.shared.token.get().is_some()
    }

    /// Whether two handles refer to the same fence.
    pub fn ptr_eq(a: &Fence, b: &Fence) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Block until this fence is done or cancelled.
    ///
    /// Convenience for [`wait`](fn@crate::wait) with a single fence.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), FenceError> {
        crate::wait::wait(std::slice::from_ref(self), crate::wait::WaitMode::All, timeout)
    }

    /// Transition `Pending → Submitted`, storing the completion token.
    ///
    /// `None` records a failed submission: the fence is submitted but can
    /// never complete.
    pub(crate) fn mark_submitted(&self, token: Option<Box<dyn CompletionToken>>) {
        if let Some(token) = token {
            if self.shared.token.set(token).is_err() {
                tracing::error!(batch = ?self.shared.batch, "fence already holds a completion token");
            }
        }
        self.transition(STATE_SUBMITTED);
    }

    /// Transition `Pending → Cancelled`.
    pub(crate) fn mark_cancelled(&self) {
        self.transition(STATE_CANCELLED);
    }

    fn transition(&self, to: u8) {
        let result = self.shared.state.compare_exchange(
            STATE_PENDING,
            to,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Err(current) = result {
            tracing::error!(
                batch = ?self.shared.batch,
                current,
                requested = to,
                "fence state transition out of pending attempted twice"
            );
            debug_assert!(false, "fence left the pending state twice");
        }
    }

    /// Park the calling thread for at most `slice`, waking early if the
    /// completion token fires.
    pub(crate) fn block_for(&self, slice: Duration) {
        let token = match self.shared.state.load(Ordering::Acquire) {
            STATE_SUBMITTED => self.shared.token.get(),
            _ => None,
        };
        match token {
            Some(token) => {
                token.wait_timeout(slice);
            }
            None => std::thread::sleep(slice),
        }
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.shared.domain.poll_interval
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("batch", &self.shared.batch)
            .field("status", &self.status())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct TestToken(Arc<AtomicBool>);

    impl CompletionToken for TestToken {
        fn is_complete(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }
    }

    fn domain(limit: usize) -> Arc<FenceDomain> {
        Arc::new(FenceDomain::new(limit, Duration::from_millis(1)))
    }

    fn counter_callback(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_fence_is_pending_with_one_holder() {
        let d = domain(4);
        let fence = Fence::create(&d, None).unwrap();
        assert_eq!(fence.ref_count(), 1);
        assert_eq!(fence.status(), FenceStatus::Pending);
        assert!(!fence.is_done());
        assert!(!fence.is_cancelled());
        assert_eq!(d.live(), 1);
    }

    #[test]
    fn callback_fires_once_on_last_release() {
        let d = domain(4);
        let fired = Arc::new(AtomicUsize::new(0));
        let fence = Fence::create(&d, None).unwrap();
        fence.add_destruction_callback(counter_callback(&fired));

        let second = fence.clone();
        assert_eq!(fence.ref_count(), 2);

        fence.release();
        assert_eq!(second.ref_count(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0, "callback fired while held");

        second.release();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(d.live(), 0);
    }

    #[test]
    fn every_callback_fires_exactly_once() {
        let d = domain(4);
        let fired = Arc::new(AtomicUsize::new(0));
        let fence = Fence::create(&d, None).unwrap();
        for _ in 0..5 {
            fence.add_destruction_callback(counter_callback(&fired));
        }
        drop(fence);
        assert_eq!(fired.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn submitted_fence_is_done_once_token_completes() {
        let d = domain(4);
        let flag = Arc::new(AtomicBool::new(false));
        let fence = Fence::create(&d, None).unwrap();
        fence.mark_submitted(Some(Box::new(TestToken(Arc::clone(&flag)))));
        assert_eq!(fence.status(), FenceStatus::Submitted);
        assert!(!fence.is_settled());

        flag.store(true, Ordering::Release);
        assert!(fence.is_done());
        assert!(!fence.is_cancelled());
        assert!(fence.is_settled());
    }

    #[test]
    fn submitted_without_token_never_completes() {
        let d = domain(4);
        let fence = Fence::create(&d, None).unwrap();
        fence.mark_submitted(None);
        assert_eq!(fence.status(), FenceStatus::Submitted);
        assert!(!fence.has_completion_token());
        assert!(!fence.is_settled());
    }

    #[test]
    fn cancelled_fence_is_never_done() {
        let d = domain(4);
        let fence = Fence::create(&d, None).unwrap();
        fence.mark_cancelled();
        assert!(fence.is_cancelled());
        assert!(!fence.is_done());
        assert!(fence.is_settled());
        assert_eq!(fence.status(), FenceStatus::Cancelled);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "pending state twice"))]
    fn state_never_regresses() {
        let d = domain(4);
        let fence = Fence::create(&d, None).unwrap();
        fence.mark_cancelled();
        fence.mark_submitted(None);
        // Release builds log and keep the first transition.
        assert!(fence.is_cancelled());
    }

    #[test]
    fn budget_exhaustion_fails_creation() {
        let d = domain(2);
        let a = Fence::create(&d, None).unwrap();
        let _b = Fence::create(&d, None).unwrap();
        assert_eq!(
            Fence::create(&d, None).unwrap_err(),
            FenceError::PrimitiveExhausted { live: 2, limit: 2 }
        );
        drop(a);
        assert!(Fence::create(&d, None).is_ok());
    }

    #[test]
    fn ptr_eq_distinguishes_fences() {
        let d = domain(4);
        let a = Fence::create(&d, Some(BatchId(1))).unwrap();
        let b = Fence::create(&d, Some(BatchId(2))).unwrap();
        assert!(Fence::ptr_eq(&a, &a.clone()));
        assert!(!Fence::ptr_eq(&a, &b));
        assert_eq!(a.batch(), Some(BatchId(1)));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn callbacks_fire_only_after_all_holders_release(
                extra_refs in 0usize..16,
                callbacks in 1usize..8,
            ) {
                let d = domain(4);
                let fired = Arc::new(AtomicUsize::new(0));
                let fence = Fence::create(&d, None).unwrap();
                for _ in 0..callbacks {
                    fence.add_destruction_callback(counter_callback(&fired));
                }
                let holders: Vec<Fence> = (0..extra_refs).map(|_| fence.clone()).collect();
                prop_assert_eq!(fence.ref_count(), extra_refs + 1);

                drop(fence);
                for holder in holders {
                    prop_assert_eq!(fired.load(Ordering::SeqCst), 0);
                    drop(holder);
                }
                prop_assert_eq!(fired.load(Ordering::SeqCst), callbacks);
                prop_assert_eq!(d.live(), 0);
            }
        }
    }
}
