//! Executor for multipart uploads with progress reporting.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use jobdash_shared::ApiError;
use tokio::sync::watch;

use crate::api_client::{ApiClient, ProgressFn, UploadFile};

/// Snapshot of one upload channel. Within a single upload, `progress`
/// only ever grows; a new upload starts back at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadState<T> {
    pub progress: u8,
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> Default for UploadState<T> {
    fn default() -> Self {
        Self {
            progress: 0,
            loading: false,
            error: None,
            data: None,
        }
    }
}

type Uploader<T> = Arc<
    dyn Fn(UploadFile, HashMap<String, String>, ProgressFn) -> BoxFuture<'static, Result<T, ApiError>>
        + Send
        + Sync,
>;

/// Wraps one upload endpoint. Uploads on the same channel are serialized:
/// a second `upload` call waits for the first to settle before starting.
pub struct UploadChannel<T> {
    uploader: Uploader<T>,
    on_progress: Option<Arc<dyn Fn(u8) + Send + Sync>>,
    on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    state: watch::Sender<UploadState<T>>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<T: Clone + Send + Sync + 'static> UploadChannel<T> {
    pub fn new<F, Fut>(uploader: F) -> Self
    where
        F: Fn(UploadFile, HashMap<String, String>, ProgressFn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let uploader: Uploader<T> =
            Arc::new(move |file, fields, progress| Box::pin(uploader(file, fields, progress)));
        let (state, _) = watch::channel(UploadState::default());
        Self {
            uploader,
            on_progress: None,
            on_success: None,
            on_error: None,
            state,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }
}

impl<T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static> UploadChannel<T> {
    /// Channel posting to a fixed endpoint through an [`ApiClient`].
    pub fn for_endpoint(client: ApiClient, path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(move |file, fields, progress| {
            let client = client.clone();
            let path = path.clone();
            async move { client.upload(&path, file, &fields, progress).await }
        })
    }
}

impl<T: Clone + Send + Sync + 'static> UploadChannel<T> {
    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
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

    pub fn state(&self) -> UploadState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState<T>> {
        self.state.subscribe()
    }

    /// Upload `file` plus `fields`. Progress resets to 0 at the start and
    /// is clamped to be non-decreasing for the duration of the call.
    pub async fn upload(
        &self,
        file: UploadFile,
        fields: HashMap<String, String>,
    ) -> Result<T, ApiError> {
        let _guard = self.in_flight.lock().await;

        self.state.send_modify(|s| {
            s.progress = 0;
            s.loading = true;
            s.error = None;
            s.data = None;
        });

        let state = self.state.clone();
        let user_callback = self.on_progress.clone();
        let progress: ProgressFn = Arc::new(move |pct| {
            state.send_modify(|s| {
                if pct > s.progress {
                    s.progress = pct;
                }
            });
            if let Some(callback) = &user_callback {
                callback(pct);
            }
        });

        match (self.uploader)(file, fields, progress).await {
            Ok(value) => {
                self.state.send_modify(|s| {
                    s.data = Some(value.clone());
                    s.loading = false;
                    s.progress = 100;
                });
                if let Some(callback) = &self.on_success {
                    callback(&value);
                }
                Ok(value)
            }
            Err(err) => {
                let message = match &err {
                    ApiError::Api { message, .. } => message.clone(),
                    _ => "Upload failed".to_string(),
                };
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                });
                if let Some(callback) = &self.on_error {
                    callback(&message);
                }
                Err(err)
            }
        }
    }

    /// Clear progress, data, and error back to the initial state.
    pub fn reset(&self) {
        let _ = self.state.send(UploadState::default());
    }
}
