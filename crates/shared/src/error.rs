//! API error taxonomy shared by every client-side caller.
//!
//! Failures are classified by what the transport observed: an HTTP status,
//! a transport-level failure before any response arrived, or a client-side
//! problem before the request was even sent. The `Display` output is the
//! human-readable message executors store in their `error` field.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 401 — the session is no longer valid.
    #[error("authentication required")]
    Auth,
    /// 403 — authenticated but not allowed.
    #[error("you do not have permission to perform this action")]
    Permission,
    /// 404.
    #[error("the requested resource was not found")]
    NotFound,
    /// Any 5xx.
    #[error("server error (HTTP {status})")]
    Server { status: u16 },
    /// Other 4xx carrying a server-supplied message.
    #[error("{message}")]
    Api { status: u16, message: String },
    /// No response received: connection failure, timeout, aborted body.
    #[error("network error: {0}")]
    Network(String),
    /// Anything else, including client-side failures before send.
    #[error("{0}")]
    Unknown(String),
}

impl ApiError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::Auth,
            403 => ApiError::Permission,
            404 => ApiError::NotFound,
            500..=599 => ApiError::Server { status },
            _ => ApiError::Api {
                status,
                message: try_error_message(body)
                    .unwrap_or_else(|| format!("request failed (HTTP {status})")),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth)
    }
}

/// Error body shapes we know how to read a message out of. Covers the
/// plain `{"message": ...}` / `{"error": ...}` convention and RFC7807-ish
/// `detail`/`title` fields.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Attempt to pull a human-readable message out of an error response body.
/// Prefers `message`, then `error`, then `detail`, then `title`.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    [parsed.message, parsed.error, parsed.detail, parsed.title]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}
