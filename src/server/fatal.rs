//! Fatal error channel.
//!
//! Platform-level faults outside any single request's error boundary are
//! logged at fatal severity and terminate the whole process; there is no
//! in-process recovery, restart is an external supervisor's job. The latch
//! guarantees exactly one termination even when multiple faults race.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::error;

pub struct FatalGuard {
    fired: AtomicBool,
    terminate: Box<dyn Fn() + Send + Sync>,
}

impl std::fmt::Debug for FatalGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatalGuard")
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

impl Default for FatalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl FatalGuard {
    pub fn new() -> Self {
        Self::with_terminator(|| std::process::exit(1))
    }

    /// Construct with a custom terminator in place of `process::exit`.
    pub fn with_terminator<F: Fn() + Send + Sync + 'static>(terminate: F) -> Self {
        Self { fired: AtomicBool::new(false), terminate: Box::new(terminate) }
    }

    /// Log at fatal severity and terminate. Only the first call acts; the
    /// return value reports whether this call performed the termination.
    pub fn dispatch(&self, origin: &str, detail: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        error!(target: "fatal", "origin={} {}", origin, detail);
        (self.terminate)();
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
