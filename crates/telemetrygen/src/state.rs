//! Run-wide stop coordination.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// State shared by the orchestrator and every worker of one run.
///
/// `running` starts `true` and is cleared at most once by the orchestrator;
/// workers only read it, once per loop iteration. `abort` is raised on a fatal
/// worker error so that workers parked in a token wait give up immediately
/// instead of waiting for their next permit.
#[derive(Debug)]
pub struct RunState {
    /// Read by every worker on every iteration; padded to keep it off the
    /// cache line of whatever the allocator places next to it.
    running: CachePadded<AtomicBool>,
    abort: watch::Sender<bool>,
}

impl RunState {
    pub fn new() -> Self {
        let (abort, _) = watch::channel(false);
        Self {
            running: CachePadded::new(AtomicBool::new(true)),
            abort,
        }
    }

    /// Returns `true` until [`stop`](Self::stop) or [`abort`](Self::abort) is called.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks workers to finish after their current iteration.
    ///
    /// Returns `true` if this call cleared the flag.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Stops the run and interrupts pending token waits.
    pub fn abort(&self) {
        self.stop();
        self.abort.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort.borrow()
    }

    /// Completes once the run has been aborted.
    ///
    /// Level-triggered: resolves immediately if the abort already happened.
    pub async fn aborted(&self) {
        let mut rx = self.abort.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
