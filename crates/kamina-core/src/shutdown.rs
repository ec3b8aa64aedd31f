//! Shutdown signalling for the community daemon.
//!
//! A single `ShutdownToken` is owned by the supervisor and shared with the OS
//! signal handler. The token is monotonic: once a shutdown has been requested
//! it can never be un-requested, so repeat signals are harmless no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{KaminaError, Result};

/// Granularity at which blocked sleeps re-check the token.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// A shared shutdown-requested flag.
///
/// Clones observe each other's state. Unlike a general cancellation token
/// there is no reset: the daemon shuts down exactly once per run.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Create a new token with no shutdown requested.
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown. Safe to call from a signal handler thread: this is
    /// a single atomic store, no I/O and no allocation.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Check whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if shutdown is requested.
    ///
    /// Returns `true` if the sleep was interrupted by a shutdown request.
    /// Used by the readiness probe and the monitoring loop so that neither
    /// blocks more than one slice past a request.
    pub fn sleep_interruptible(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Registers OS termination signals against a `ShutdownToken`.
///
/// SIGINT, SIGTERM and SIGHUP all request a graceful shutdown. The handler's
/// only action is setting the token; the supervisor's monitoring loop does
/// the actual teardown.
pub struct SignalBridge;

impl SignalBridge {
    /// Install the handler. May only be called once per process.
    pub fn install(token: ShutdownToken) -> Result<()> {
        ctrlc::set_handler(move || token.request()).map_err(|e| {
            KaminaError::Other(format!("failed to install signal handler: {e}"))
        })
    }
}
