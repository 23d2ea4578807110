//! Debounce and throttle over a generic callable, with explicit cancel.
//!
//! Both wrappers must be used from within a Tokio runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs the wrapped action once the calls go quiet for `delay`.
/// Each `call` replaces any pending invocation.
pub struct Debounced {
    delay: Duration,
    action: Arc<dyn Fn() + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debounced {
    pub fn new(delay: Duration, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    /// Schedule the action after `delay`, discarding any pending run.
    pub fn call(&self) {
        let mut pending = self.pending.lock().expect("debounce lock");
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let action = self.action.clone();
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Drop any pending invocation without running it.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().expect("debounce lock").take() {
            handle.abort();
        }
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs the wrapped action at most once per `min_gap`; calls inside the
/// gap are dropped.
pub struct Throttled {
    min_gap: Duration,
    action: Arc<dyn Fn() + Send + Sync>,
    last_fire: Mutex<Option<Instant>>,
}

impl Throttled {
    pub fn new(min_gap: Duration, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            min_gap,
            action: Arc::new(action),
            last_fire: Mutex::new(None),
        }
    }

    /// Run the action now unless one ran within the last `min_gap`.
    /// Returns whether the action ran.
    pub fn call(&self) -> bool {
        let mut last = self.last_fire.lock().expect("throttle lock");
        let now = Instant::now();
        let due = last.map_or(true, |t| now.duration_since(t) >= self.min_gap);
        if due {
            *last = Some(now);
            (self.action)();
        }
        due
    }

    /// Forget the last firing, so the next `call` runs immediately.
    pub fn reset(&self) {
        *self.last_fire.lock().expect("throttle lock") = None;
    }
}
