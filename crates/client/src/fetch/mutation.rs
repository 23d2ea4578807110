//! Executor for write operations (create/update/delete).

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use jobdash_shared::ApiError;
use tokio::sync::watch;

use super::request::RequestState;

type Operation<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Like [`super::RequestExecutor`] but never auto-runs: every call is
/// caller-triggered, and an `on_settled` callback fires after either
/// outcome for cleanup that must not depend on success.
pub struct MutationExecutor<A, T> {
    op: Operation<A, T>,
    on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_settled: Option<Arc<dyn Fn() + Send + Sync>>,
    state: watch::Sender<RequestState<T>>,
}

impl<A: Send + 'static, T: Clone + Send + Sync + 'static> MutationExecutor<A, T> {
    pub fn new<F, Fut>(op: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let op: Operation<A, T> = Arc::new(move |args| Box::pin(op(args)));
        let (state, _) = watch::channel(RequestState::default());
        Self {
            op,
            on_success: None,
            on_error: None,
            on_settled: None,
            state,
        }
    }

    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Invoked after every `mutate`, success or failure.
    pub fn on_settled(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_settled = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.state.subscribe()
    }

    /// Run the write operation. The failure is both recorded in state and
    /// returned to the caller.
    pub async fn mutate(&self, args: A) -> Result<T, ApiError> {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = (self.op)(args).await;
        let outcome = match result {
            Ok(value) => {
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
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                });
                if let Some(callback) = &self.on_error {
                    callback(&message);
                }
                Err(err)
            }
        };

        if let Some(callback) = &self.on_settled {
            callback();
        }
        outcome
    }

    /// Clear data, error, and loading back to the initial state.
    pub fn reset(&self) {
        let _ = self.state.send(RequestState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn settled_fires_on_both_outcomes() {
        let settled = Arc::new(AtomicUsize::new(0));
        let settled_cb = settled.clone();

        let executor = MutationExecutor::new(|ok: bool| async move {
            if ok {
                Ok("created".to_string())
            } else {
                Err(ApiError::Api {
                    status: 409,
                    message: "duplicate".to_string(),
                })
            }
        })
        .on_settled(move || {
            settled_cb.fetch_add(1, Ordering::SeqCst);
        });

        executor.mutate(true).await.unwrap();
        assert_eq!(settled.load(Ordering::SeqCst), 1);
        assert_eq!(executor.state().data, Some("created".to_string()));

        executor.mutate(false).await.unwrap_err();
        assert_eq!(settled.load(Ordering::SeqCst), 2);
        assert_eq!(executor.state().error, Some("duplicate".to_string()));
    }

    #[tokio::test]
    async fn reset_returns_to_initial_state() {
        let executor = MutationExecutor::new(|n: u32| async move { Ok(n + 1) });

        executor.mutate(1).await.unwrap();
        assert_eq!(executor.state().data, Some(2));

        executor.reset();
        let state = executor.state();
        assert_eq!(state.data, None);
        assert_eq!(state.error, None);
        assert!(!state.loading);
    }
}
