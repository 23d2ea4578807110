//! Generic executor for one asynchronous read operation.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use jobdash_shared::ApiError;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::storage;

/// Snapshot of one executor's lifecycle. While `loading` is true the
/// `error` field is always `None`; previously fetched `data` is kept until
/// a newer response replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// The wrapped async operation.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

struct SnapshotHook<T> {
    save: Arc<dyn Fn(&T) + Send + Sync>,
    load: Arc<dyn Fn() -> Option<T> + Send + Sync>,
}

/// Wraps one async call with `{data, loading, error}` bookkeeping.
///
/// There is no in-flight cancellation: a new `execute` while an earlier
/// one is still pending leaves both running, and state reflects whichever
/// response lands last.
pub struct RequestExecutor<T> {
    fetcher: Fetcher<T>,
    transform: Option<Arc<dyn Fn(T) -> T + Send + Sync>>,
    on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    snapshot: Option<SnapshotHook<T>>,
    state: watch::Sender<RequestState<T>>,
}

impl<T: Clone + Send + Sync + 'static> RequestExecutor<T> {
    pub fn new<F, Fut>(fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || Box::pin(fetcher()));
        let (state, _) = watch::channel(RequestState::default());
        Self {
            fetcher,
            transform: None,
            on_success: None,
            on_error: None,
            snapshot: None,
            state,
        }
    }

    /// Post-process a successful result before it is stored.
    pub fn with_transform(mut self, transform: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Persist every successful result under `key` and fall back to the
    /// last persisted payload when a fetch fails with nothing loaded yet.
    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        let key = key.into();
        let save_key = key.clone();
        self.snapshot = Some(SnapshotHook {
            save: Arc::new(move |value: &T| {
                storage::save_snapshot(&save_key, value);
            }),
            load: Arc::new(move || storage::load_snapshot::<T>(&key).map(|s| s.payload)),
        });
        self
    }

    /// Current state snapshot.
    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.state.subscribe()
    }

    /// Run the wrapped operation once. The failure is both recorded in
    /// state and returned, so callers can layer their own handling on top.
    pub async fn execute(&self) -> Result<T, ApiError> {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        match (self.fetcher)().await {
            Ok(value) => {
                let value = match &self.transform {
                    Some(transform) => transform(value),
                    None => value,
                };
                if let Some(hook) = &self.snapshot {
                    (hook.save)(&value);
                }
                self.state.send_modify(|s| {
                    s.data = Some(value.clone());
                    s.loading = false;
                    s.error = None;
                });
                if let Some(callback) = &self.on_success {
                    callback(&value);
                }
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                let fallback = match &self.snapshot {
                    Some(hook) => (hook.load)(),
                    None => None,
                };
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                    if s.data.is_none() {
                        s.data = fallback;
                    }
                });
                if let Some(callback) = &self.on_error {
                    callback(&message);
                }
                Err(err)
            }
        }
    }

    /// Re-run the operation, discarding the result; the outcome is already
    /// reflected in state.
    pub async fn retry(&self) {
        if let Err(err) = self.execute().await {
            tracing::debug!("retry failed: {err}");
        }
    }

    /// Alias of [`RequestExecutor::execute`].
    pub async fn refetch(&self) -> Result<T, ApiError> {
        self.execute().await
    }

    /// Run automatically: once now if the authenticated signal is already
    /// true, and again on every transition to true. The loop ends when the
    /// signal's sender is dropped or the returned handle is aborted.
    pub fn start_auto_run(self: &Arc<Self>, mut authed: watch::Receiver<bool>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if *authed.borrow_and_update() {
                this.retry().await;
            }
            loop {
                if authed.changed().await.is_err() {
                    break;
                }
                if *authed.borrow_and_update() {
                    this.retry().await;
                }
            }
        })
    }
}
