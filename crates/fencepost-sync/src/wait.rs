//! Blocking waits over sets of fences.

use std::time::{Duration, Instant};

use fencepost_core::FenceError;

use crate::fence::Fence;

/// Which condition satisfies a [`wait`](fn@crate::wait) call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Every fence must be settled. Trivially satisfied by an empty set.
    All,
    /// At least one fence must be settled. An empty set is an error.
    Any,
}

/// Block until the fences satisfy `mode` or `timeout` elapses.
///
/// A fence counts as settled when it is done or cancelled; cancelled work
/// will never run, so waiting on it would hang forever. `None` waits
/// without a deadline.
///
/// In `All` mode the calling thread parks on the completion token of the
/// first unsettled fence. Fences without a token (still recording, or a
/// failed submission) are polled at the context's wait interval.
pub fn wait(fences: &[Fence], mode: WaitMode, timeout: Option<Duration>) -> Result<(), FenceError> {
    let Some(first) = fences.first() else {
        return match mode {
            WaitMode::All => Ok(()),
            WaitMode::Any => {
                tracing::warn!("wait-any called with an empty fence set");
                Err(FenceError::NothingToWait)
            }
        };
    };

    let start = Instant::now();
    let deadline = timeout.map(|t| start + t);

    loop {
        let blocker = match mode {
            WaitMode::All => match fences.iter().find(|f| !f.is_settled()) {
                Some(fence) => Some(fence),
                None => return Ok(()),
            },
            WaitMode::Any => {
                if fences.iter().any(Fence::is_settled) {
                    return Ok(());
                }
                None
            }
        };

        let mut slice = blocker.unwrap_or(first).poll_interval();
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(FenceError::Timeout {
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            slice = slice.min(deadline - now);
        }

        match blocker {
            Some(fence) => fence.block_for(slice),
            None => std::thread::sleep(slice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::FenceDomain;
    use fencepost_core::CompletionToken;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct TestToken(Arc<AtomicBool>);

    impl CompletionToken for TestToken {
        fn is_complete(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }
    }

    fn domain() -> Arc<FenceDomain> {
        Arc::new(FenceDomain::new(16, Duration::from_millis(1)))
    }

    fn submitted(domain: &Arc<FenceDomain>) -> (Fence, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        let fence = Fence::create(domain, None).unwrap();
        fence.mark_submitted(Some(Box::new(TestToken(Arc::clone(&flag)))));
        (fence, flag)
    }

    #[test]
    fn all_of_nothing_returns_immediately() {
        assert_eq!(wait(&[], WaitMode::All, Some(Duration::ZERO)), Ok(()));
    }

    #[test]
    fn any_of_nothing_is_an_error() {
        assert_eq!(wait(&[], WaitMode::Any, None), Err(FenceError::NothingToWait));
    }

    #[test]
    fn all_times_out_while_one_fence_is_outstanding() {
        let d = domain();
        let (a, flag_a) = submitted(&d);
        let (b, _flag_b) = submitted(&d);
        flag_a.store(true, Ordering::Release);

        let result = wait(&[a, b], WaitMode::All, Some(Duration::from_millis(5)));
        assert!(matches!(result, Err(FenceError::Timeout { .. })));
    }

    #[test]
    fn any_returns_once_one_fence_completes() {
        let d = domain();
        let (a, _flag_a) = submitted(&d);
        let (b, flag_b) = submitted(&d);
        flag_b.store(true, Ordering::Release);
        assert_eq!(wait(&[a, b], WaitMode::Any, Some(Duration::ZERO)), Ok(()));
    }

    #[test]
    fn cancelled_fence_satisfies_wait() {
        let d = domain();
        let fence = Fence::create(&d, None).unwrap();
        fence.mark_cancelled();
        assert_eq!(fence.wait(Some(Duration::ZERO)), Ok(()));
    }

    #[test]
    fn wait_wakes_when_completed_from_another_thread() {
        let d = domain();
        let (fence, flag) = submitted(&d);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            flag.store(true, Ordering::Release);
        });
        assert_eq!(fence.wait(Some(Duration::from_secs(10))), Ok(()));
        assert!(fence.is_done());
        handle.join().unwrap();
    }

    #[test]
    fn pending_fence_times_out() {
        let d = domain();
        let fence = Fence::create(&d, None).unwrap();
        let result = fence.wait(Some(Duration::from_millis(3)));
        assert!(matches!(result, Err(FenceError::Timeout { .. })));
    }
}
