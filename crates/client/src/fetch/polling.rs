//! Interval-based polling over an async fetch function.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jobdash_shared::ApiError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::request::Fetcher;

/// Poll cadence for the notification fallback.
pub const NOTIFICATIONS_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Poll cadence for dashboard refreshes.
pub const DASHBOARD_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Snapshot of one polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_polling: bool,
}

impl<T> Default for PollingState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            is_polling: false,
        }
    }
}

/// Repeatedly invokes a fetch on a fixed wall-clock interval while
/// active.
///
/// Polling starts only while the authenticated signal is true and stops
/// when it goes false, when [`PollingLoop::stop_polling`] is called, or
/// when the loop is dropped. Exactly one timer runs per instance;
/// re-entering polling replaces the previous timer. Ticks spawn
/// independent fetches: a slow response never delays the timer, and
/// overlapping responses land in arrival order.
pub struct PollingLoop<T> {
    fetcher: Fetcher<T>,
    interval: Duration,
    authed: watch::Receiver<bool>,
    state: watch::Sender<PollingState<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> PollingLoop<T> {
    pub fn new<F, Fut>(interval: Duration, authed: watch::Receiver<bool>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || Box::pin(fetcher()));
        let (state, _) = watch::channel(PollingState::default());
        Self {
            fetcher,
            interval,
            authed,
            state,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollingState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingState<T>> {
        self.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.state.borrow().is_polling
    }

    /// Enter the polling state: fetch immediately, then on every interval
    /// tick. A no-op while the authenticated signal is false.
    pub fn start_polling(&self) {
        if !*self.authed.borrow() {
            tracing::debug!("polling not started: unauthenticated");
            return;
        }

        let mut task = self.task.lock().expect("polling task lock");
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.state.send_modify(|s| s.is_polling = true);

        let fetcher = self.fetcher.clone();
        let state = self.state.clone();
        let mut authed = self.authed.clone();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let fetcher = fetcher.clone();
                        let state = state.clone();
                        tokio::spawn(async move {
                            state.send_modify(|s| {
                                s.loading = true;
                                s.error = None;
                            });
                            match fetcher().await {
                                Ok(value) => state.send_modify(|s| {
                                    s.data = Some(value);
                                    s.loading = false;
                                }),
                                Err(err) => {
                                    let message = err.to_string();
                                    state.send_modify(|s| {
                                        s.loading = false;
                                        s.error = Some(message);
                                    });
                                }
                            }
                        });
                    }
                    changed = authed.changed() => {
                        if changed.is_err() || !*authed.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
            state.send_modify(|s| s.is_polling = false);
        }));
    }

    /// Leave the polling state, cancelling the timer. Already-started
    /// fetches are allowed to land; no new ticks fire.
    pub fn stop_polling(&self) {
        let mut task = self.task.lock().expect("polling task lock");
        if let Some(handle) = task.take() {
            handle.abort();
        }
        self.state.send_modify(|s| s.is_polling = false);
    }
}

impl<T> Drop for PollingLoop<T> {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}
