//! Cooperative cancellation shared by the poller and the processor

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cloneable stop token
///
/// Every clone observes the same flag. Loops check [`is_stopped`](Self::is_stopped)
/// at the top of each cycle and use [`wait_timeout`](Self::wait_timeout) instead
/// of `thread::sleep` so a stop request cuts their sleep short.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every holder of this signal to stop
    pub fn stop(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for up to `timeout`, waking early if a stop is requested
    ///
    /// Returns `true` if the signal is stopped when the wait ends.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut stopped = flag.lock();

        while !*stopped {
            if condvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }

        *stopped
    }
}
