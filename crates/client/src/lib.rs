//! jobdash client data layer.
//!
//! This crate contains the data-access and real-time notification layer
//! for the jobdash dashboard: a shared HTTP transport with bearer-token
//! injection and global 401 handling, stateful executors for reads,
//! paginated collections, mutations, uploads and polling, a notification
//! hub fed by both REST and a reconnecting WebSocket, and a best-effort
//! local snapshot cache.
//!
//! UI concerns live elsewhere; everything here publishes state over
//! `tokio::sync::watch` channels for any frontend to subscribe to.

pub mod api_client;
pub mod auth_session;
pub mod config;
pub mod debounce;
pub mod fetch;
pub mod logging;
pub mod storage;
pub mod stores;
pub mod ws;

pub use api_client::{ApiClient, UploadFile};
pub use auth_session::{Session, SessionStore};
pub use config::ClientConfig;
pub use fetch::{
    MutationExecutor, PageParams, PaginatedCollection, PollingLoop, RequestExecutor, UploadChannel,
};
pub use stores::{NotificationHub, NotificationList, NotificationPermission, SystemNotifier};
pub use ws::{ConnectionState, ReconnectConfig};
