//! Request primitives: stateful wrappers around asynchronous API calls.
//!
//! Every wrapper owns its state exclusively and publishes snapshots over a
//! `tokio::sync::watch` channel, so consumers subscribe to
//! `{data, loading, error}` transitions instead of polling. None of them
//! cancels an in-flight call: when executions overlap, whichever response
//! arrives last wins.

pub mod mutation;
pub mod paginated;
pub mod polling;
pub mod request;
pub mod upload;

pub use mutation::MutationExecutor;
pub use paginated::{PageParams, PageParamsUpdate, PageState, PaginatedCollection, SortOrder};
pub use polling::{PollingLoop, PollingState, DASHBOARD_POLL_INTERVAL, NOTIFICATIONS_POLL_INTERVAL};
pub use request::{Fetcher, RequestExecutor, RequestState};
pub use upload::{UploadChannel, UploadState};
