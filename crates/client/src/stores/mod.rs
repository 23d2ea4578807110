//! Stateful stores: single sources of truth for cross-cutting client
//! state.

pub mod notifications;

pub use notifications::{
    NotificationHub, NotificationList, NotificationPermission, SystemNotifier, TracingNotifier,
};
