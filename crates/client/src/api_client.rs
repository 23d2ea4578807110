//! HTTP API client for the jobdash REST surface.
//!
//! One client instance is shared by every executor. It owns the base URL,
//! the request timeout, bearer-token injection, and the global 401
//! handling: any unauthorized response invalidates the session store,
//! which tears down everything gated on the authenticated signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream;
use jobdash_shared::{ApiEnvelope, ApiError, Notification, NotificationSettings, PageEnvelope};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth_session::SessionStore;

/// Transport-level request timeout. A request that exceeds it fails like
/// any other network error.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback invoked with integer percentages in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A file payload for multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// HTTP client for making authenticated API requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a new API client bound to a session store.
    pub fn new(session: Arc<SessionStore>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: String::new(),
            session,
        }
    }

    /// Set the base URL for API requests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    fn transport_error(e: reqwest::Error) -> ApiError {
        if e.is_builder() {
            ApiError::Unknown(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// Classify a non-success response. 401 is the one cross-cutting case:
    /// it resets the session here so every caller sees the same teardown.
    fn classify(&self, status: u16, body: &str) -> ApiError {
        let err = ApiError::from_status(status, body);
        if err.is_auth() {
            self.session.invalidate();
        }
        err
    }

    async fn read_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(self.classify(status, &text));
        }

        if text.is_empty() {
            serde_json::from_str("null")
                .map_err(|e| ApiError::Unknown(format!("failed to decode response: {e}")))
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ApiError::Unknown(format!("failed to decode response: {e}")))
        }
    }

    async fn read_unit(&self, resp: Response) -> Result<(), ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(self.classify(status, &text));
        }

        Ok(())
    }

    /// Make a GET request.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let rb = self.authorize(self.client.get(self.url(path)));
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_json(resp).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let rb = self.authorize(self.client.post(self.url(path))).json(body);
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_json(resp).await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let rb = self.authorize(self.client.put(self.url(path))).json(body);
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_json(resp).await
    }

    /// Make a PATCH request with a JSON body.
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let rb = self.authorize(self.client.patch(self.url(path))).json(body);
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_json(resp).await
    }

    /// Make a PUT request with no body, discarding the response payload.
    pub async fn put_empty(&self, path: &str) -> Result<(), ApiError> {
        let rb = self.authorize(self.client.put(self.url(path)));
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_unit(resp).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let rb = self.authorize(self.client.delete(self.url(path)));
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_unit(resp).await
    }

    /// POST a multipart form: one file part plus arbitrary extra fields.
    ///
    /// `on_progress` is invoked with an integer percentage as each chunk of
    /// the file is handed to the transport; within one call the reported
    /// percentage only ever grows.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: UploadFile,
        fields: &HashMap<String, String>,
        on_progress: ProgressFn,
    ) -> Result<T, ApiError> {
        let total = file.bytes.len();
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(|c| c.to_vec())
            .collect();

        let mut loaded = 0usize;
        let byte_stream = stream::iter(chunks.into_iter().map(move |chunk| {
            loaded += chunk.len();
            let pct = ((loaded as f64) * 100.0 / (total as f64)).round() as u8;
            on_progress(pct);
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(Body::wrap_stream(byte_stream), total as u64)
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ApiError::Unknown(format!("invalid mime type: {e}")))?;

        let mut form = Form::new().part("file", part);
        for (key, value) in fields {
            form = form.text(key.clone(), value.clone());
        }

        let rb = self
            .authorize(self.client.post(self.url(path)))
            .multipart(form);
        let resp = rb.send().await.map_err(Self::transport_error)?;
        self.read_json(resp).await
    }

    // --- Notification API methods ---

    /// Fetch the most recent notifications.
    pub async fn list_notifications(
        &self,
        limit: u32,
    ) -> Result<PageEnvelope<Notification>, ApiError> {
        self.get_json(&format!("/api/notifications?limit={limit}"))
            .await
    }

    /// Mark one notification as read.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_empty(&format!("/api/notifications/{id}/read"))
            .await
    }

    /// Mark every notification as read.
    pub async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.put_empty("/api/notifications/read-all").await
    }

    /// Delete one notification.
    pub async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/notifications/{id}")).await
    }

    /// Get the current user's notification settings.
    pub async fn get_notification_settings(&self) -> Result<NotificationSettings, ApiError> {
        let env: ApiEnvelope<NotificationSettings> =
            self.get_json("/api/notifications/settings").await?;
        Ok(env.data)
    }

    /// Update the current user's notification settings.
    pub async fn update_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings, ApiError> {
        let env: ApiEnvelope<NotificationSettings> = self
            .put_json("/api/notifications/settings", settings)
            .await?;
        Ok(env.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_session::Session;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn authed_client(base_url: String) -> (ApiClient, Arc<SessionStore>) {
        let session = Arc::new(SessionStore::ephemeral());
        session.login(Session {
            token: "tok".to_string(),
            user_id: "u1".to_string(),
            role: "seeker".to_string(),
        });
        let client = ApiClient::new(session.clone()).with_base_url(base_url);
        (client, session)
    }

    /// Serve exactly one canned HTTP response on an ephemeral port.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut data = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            data.extend_from_slice(&buf[..n]);
                            if data.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                let resp = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn url_joining() {
        let client = ApiClient::new(Arc::new(SessionStore::ephemeral()))
            .with_base_url("http://localhost:8000/");
        assert_eq!(
            client.url("/api/jobs"),
            "http://localhost:8000/api/jobs"
        );
        assert_eq!(client.url("api/jobs"), "http://localhost:8000/api/jobs");
        assert_eq!(
            client.url("https://other.example/x"),
            "https://other.example/x"
        );

        let bare = ApiClient::new(Arc::new(SessionStore::ephemeral()));
        assert_eq!(bare.url("api/jobs"), "/api/jobs");
    }

    #[tokio::test]
    async fn unauthorized_response_invalidates_session() {
        let base = one_shot_server("401 Unauthorized", "{}").await;
        let (client, session) = authed_client(base);
        assert!(session.is_authenticated());

        let err = client
            .get_json::<serde_json::Value>("/api/me")
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Auth);
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn server_message_surfaces_in_api_error() {
        let base =
            one_shot_server("422 Unprocessable Entity", r#"{"message":"title is required"}"#).await;
        let (client, _session) = authed_client(base);

        let err = client
            .get_json::<serde_json::Value>("/api/jobs")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "title is required");
    }

    #[tokio::test]
    async fn connection_refused_classifies_as_network() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (client, session) = authed_client(format!("http://{addr}"));
        let err = client
            .get_json::<serde_json::Value>("/api/jobs")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        // Transport failures do not touch the session.
        assert!(session.is_authenticated());
    }
}
