//! Shared data models and error types for the jobdash API surface.
//!
//! This crate is consumed by the client data layer and by anything else
//! that speaks the jobdash REST/WebSocket protocol.

pub mod error;
pub mod models;

pub use error::{try_error_message, ApiError};
pub use models::{
    ApiEnvelope, Notification, NotificationPriority, NotificationSettings, NotificationType,
    PageEnvelope,
};
