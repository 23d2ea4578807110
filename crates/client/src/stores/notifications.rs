//! The notification hub: single source of truth for notifications across
//! the application.
//!
//! The hub combines a REST resync path, a push channel with reconnect,
//! and a fixed-interval polling fallback. All three funnel into one
//! [`NotificationList`] so the unread-count bookkeeping is maintained in
//! exactly one place. Local mutations (mark-read, mark-all-read, delete)
//! apply optimistically before the confirming REST call resolves and are
//! not rolled back if it fails; the recovery path is a
//! [`NotificationHub::fetch_notifications`] resync.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jobdash_shared::{ApiError, Notification, NotificationSettings};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api_client::ApiClient;
use crate::auth_session::SessionStore;
use crate::fetch::NOTIFICATIONS_POLL_INTERVAL;
use crate::ws::{self, ConnectionState, ReconnectConfig};

const DEFAULT_FETCH_LIMIT: u32 = 50;

/// The notification list plus its unread count, newest first.
///
/// `unread_count` always equals the number of entries with
/// `is_read == false`; every mutation goes through a method here so the
/// two cannot drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationList {
    items: Vec<Notification>,
    unread_count: usize,
}

impl NotificationList {
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    /// Replace the list wholesale from an authoritative fetch and
    /// recompute the unread count.
    pub fn set_all(&mut self, mut items: Vec<Notification>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.unread_count = items.iter().filter(|n| !n.is_read).count();
        self.items = items;
    }

    /// Prepend a notification, deduplicating by id.
    /// Returns false if an entry with the same id already exists.
    pub fn add(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.is_read {
            self.unread_count += 1;
        }
        self.items.insert(0, notification);
        true
    }

    /// Flip one notification to read.
    /// Returns true if the entry existed and was unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        if let Some(n) = self.items.iter_mut().find(|n| n.id == id) {
            if !n.is_read {
                n.is_read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                return true;
            }
        }
        false
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.is_read = true;
        }
        self.unread_count = 0;
    }

    /// Remove one notification, returning it if it existed.
    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let position = self.items.iter().position(|n| n.id == id)?;
        let removed = self.items.remove(position);
        if !removed.is_read {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        Some(removed)
    }
}

/// User-facing notification permission, mirroring the tri-state of
/// OS/browser notification APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    /// Not yet decided; a prompt is allowed.
    Default,
    Granted,
    Denied,
}

/// Sink for user-facing system notifications.
pub trait SystemNotifier: Send + Sync {
    /// Prompt the user for permission. Called at most once, and only from
    /// the [`NotificationPermission::Default`] state.
    fn request_permission(&self) -> NotificationPermission;

    /// Raise a user-facing notification.
    fn notify(&self, title: &str, message: &str);
}

/// Default sink: logs instead of raising OS notifications.
pub struct TracingNotifier;

impl SystemNotifier for TracingNotifier {
    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "notification");
    }
}

struct HubTasks {
    socket: Option<JoinHandle<()>>,
    poll: Option<JoinHandle<()>>,
}

/// Process-wide notification service.
///
/// Construct one per authenticated session; `start` brings up the push
/// channel and the polling fallback, and both tear down when `stop` is
/// called or the authenticated signal goes false.
pub struct NotificationHub {
    client: ApiClient,
    session: Arc<SessionStore>,
    ws_url: String,
    reconnect: ReconnectConfig,
    poll_interval: Duration,
    fetch_limit: u32,
    notifier: Arc<dyn SystemNotifier>,
    state: watch::Sender<NotificationList>,
    conn_state: watch::Sender<ConnectionState>,
    settings: Mutex<NotificationSettings>,
    permission: Mutex<NotificationPermission>,
    tasks: Mutex<HubTasks>,
}

impl NotificationHub {
    pub fn new(client: ApiClient, session: Arc<SessionStore>, ws_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(NotificationList::default());
        let (conn_state, _) = watch::channel(ConnectionState::Closed);
        Self {
            client,
            session,
            ws_url: ws_url.into(),
            reconnect: ReconnectConfig::default(),
            poll_interval: NOTIFICATIONS_POLL_INTERVAL,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            notifier: Arc::new(TracingNotifier),
            state,
            conn_state,
            settings: Mutex::new(NotificationSettings::default()),
            permission: Mutex::new(NotificationPermission::Default),
            tasks: Mutex::new(HubTasks {
                socket: None,
                poll: None,
            }),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SystemNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit;
        self
    }

    // --- Lifecycle ---

    /// Bring up the push channel and the polling fallback. A no-op while
    /// unauthenticated. Calling again replaces any previous tasks.
    pub fn start(self: &Arc<Self>) {
        if !self.session.is_authenticated() {
            tracing::debug!("notification hub not started: unauthenticated");
            return;
        }

        let mut tasks = self.tasks.lock().expect("hub task lock");
        if let Some(previous) = tasks.socket.take() {
            previous.abort();
        }
        if let Some(previous) = tasks.poll.take() {
            previous.abort();
        }

        let session = self.session.clone();
        let ws_url = self.ws_url.clone();
        let url_builder = Arc::new(move || {
            let token = session.token()?;
            ws::notifications_socket_url(&ws_url, &token)
        });
        let hub = Arc::clone(self);
        let on_notification =
            Arc::new(move |notification: Notification| hub.add_notification(notification));
        tasks.socket = Some(ws::spawn_socket_loop(
            url_builder,
            on_notification,
            self.conn_state.clone(),
            self.session.watch_authenticated(),
            self.reconnect.clone(),
        ));

        // Polling fallback: an immediate resync, then one per interval,
        // reconciling anything the push channel missed.
        let hub = Arc::clone(self);
        tasks.poll = Some(tokio::spawn(async move {
            if let Err(err) = hub.load_settings().await {
                tracing::debug!("notification settings fetch failed: {err}");
            }
            let mut authed = hub.session.watch_authenticated();
            let mut ticker = tokio::time::interval(hub.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = hub.fetch_notifications(hub.fetch_limit).await {
                            tracing::debug!("notification resync failed: {err}");
                        }
                    }
                    changed = authed.changed() => {
                        if changed.is_err() || !*authed.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Tear down the push channel and polling fallback.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().expect("hub task lock");
        if let Some(handle) = tasks.socket.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.poll.take() {
            handle.abort();
        }
        let _ = self.conn_state.send(ConnectionState::Closed);
    }

    // --- Read side ---

    pub fn snapshot(&self) -> NotificationList {
        self.state.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.borrow().items().to_vec()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    /// Subscribe to list changes.
    pub fn subscribe(&self) -> watch::Receiver<NotificationList> {
        self.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_state.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.conn_state.subscribe()
    }

    // --- Mutations ---

    /// Authoritative resync: replace the local list from the server and
    /// recompute the unread count.
    pub async fn fetch_notifications(&self, limit: u32) -> Result<Vec<Notification>, ApiError> {
        let envelope = self.client.list_notifications(limit).await?;
        self.state
            .send_modify(|list| list.set_all(envelope.data.clone()));
        Ok(envelope.data)
    }

    /// Optimistically mark one notification read, then confirm with the
    /// server. A failed confirmation is not rolled back; resync via
    /// [`NotificationHub::fetch_notifications`] to recover.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), ApiError> {
        self.state.send_modify(|list| {
            list.mark_read(id);
        });
        self.client.mark_notification_read(id).await
    }

    /// Optimistically mark everything read, then confirm with the server.
    pub async fn mark_all_as_read(&self) -> Result<(), ApiError> {
        self.state.send_modify(|list| list.mark_all_read());
        self.client.mark_all_notifications_read().await
    }

    /// Optimistically remove one notification, then confirm with the
    /// server.
    pub async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        self.state.send_modify(|list| {
            list.remove(id);
        });
        self.client.delete_notification(id).await
    }

    /// Ingest one push-delivered notification. Prepends to the list,
    /// bumps the unread count, and — when permission is granted and the
    /// user's settings allow the category — raises a system notification.
    pub fn add_notification(&self, notification: Notification) {
        let inserted = self
            .state
            .send_if_modified(|list| list.add(notification.clone()));
        if !inserted {
            return;
        }

        let allowed = self
            .settings
            .lock()
            .expect("settings lock")
            .allows_push(notification.r#type);
        let granted =
            *self.permission.lock().expect("permission lock") == NotificationPermission::Granted;
        if allowed && granted {
            self.notifier.notify(&notification.title, &notification.message);
        }
    }

    // --- Permission ---

    pub fn permission(&self) -> NotificationPermission {
        *self.permission.lock().expect("permission lock")
    }

    /// Prompt for permission if it has not been decided yet; otherwise
    /// return the existing state without prompting again.
    pub fn request_notification_permission(&self) -> NotificationPermission {
        let mut permission = self.permission.lock().expect("permission lock");
        if *permission == NotificationPermission::Default {
            *permission = self.notifier.request_permission();
        }
        *permission
    }

    // --- Settings ---

    pub fn settings(&self) -> NotificationSettings {
        self.settings.lock().expect("settings lock").clone()
    }

    pub async fn load_settings(&self) -> Result<NotificationSettings, ApiError> {
        let settings = self.client.get_notification_settings().await?;
        *self.settings.lock().expect("settings lock") = settings.clone();
        Ok(settings)
    }

    pub async fn update_settings(
        &self,
        settings: NotificationSettings,
    ) -> Result<NotificationSettings, ApiError> {
        let confirmed = self.client.update_notification_settings(&settings).await?;
        *self.settings.lock().expect("settings lock") = confirmed.clone();
        Ok(confirmed)
    }

    /// Seed settings without a server round-trip.
    pub fn with_settings(self, settings: NotificationSettings) -> Self {
        *self.settings.lock().expect("settings lock") = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_session::Session;
    use chrono::{Duration as ChronoDuration, Utc};
    use futures_util::SinkExt;
    use jobdash_shared::{NotificationPriority, NotificationType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_tungstenite::tungstenite::Message;

    fn notification(id: &str, is_read: bool, minutes_ago: i64) -> Notification {
        Notification {
            id: id.to_string(),
            title: format!("title {id}"),
            message: format!("message {id}"),
            r#type: NotificationType::JobMatch,
            priority: NotificationPriority::Medium,
            is_read,
            created_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    fn assert_invariant(list: &NotificationList) {
        let unread = list.items().iter().filter(|n| !n.is_read).count();
        assert_eq!(
            list.unread_count(),
            unread,
            "unread_count must match the list"
        );
    }

    /// A hub whose REST and socket endpoints refuse every connection.
    async fn offline_hub() -> (Arc<NotificationHub>, Arc<SessionStore>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = Arc::new(SessionStore::ephemeral());
        session.login(Session {
            token: "tok".to_string(),
            user_id: "u1".to_string(),
            role: "seeker".to_string(),
        });
        let client = ApiClient::new(session.clone()).with_base_url(format!("http://{addr}"));
        let hub = Arc::new(NotificationHub::new(
            client,
            session.clone(),
            format!("ws://{addr}"),
        ));
        (hub, session)
    }

    struct TestNotifier {
        grant: NotificationPermission,
        prompts: AtomicUsize,
        notified: Mutex<Vec<(String, String)>>,
    }

    impl TestNotifier {
        fn new(grant: NotificationPermission) -> Arc<Self> {
            Arc::new(Self {
                grant,
                prompts: AtomicUsize::new(0),
                notified: Mutex::new(Vec::new()),
            })
        }
    }

    impl SystemNotifier for TestNotifier {
        fn request_permission(&self) -> NotificationPermission {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.grant
        }

        fn notify(&self, title: &str, message: &str) {
            self.notified
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
        }
    }

    #[test]
    fn list_mutations_uphold_the_unread_invariant() {
        let mut list = NotificationList::default();

        list.set_all(vec![
            notification("a", false, 30),
            notification("b", true, 20),
            notification("c", false, 10),
        ]);
        assert_invariant(&list);
        assert_eq!(list.unread_count(), 2);
        // Newest first regardless of fetch order.
        let ids: Vec<_> = list.items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        assert!(list.add(notification("d", false, 0)));
        assert_invariant(&list);
        assert_eq!(list.items()[0].id, "d");
        assert_eq!(list.unread_count(), 3);

        // Duplicate ids are dropped.
        assert!(!list.add(notification("d", false, 0)));
        assert_invariant(&list);
        assert_eq!(list.unread_count(), 3);

        assert!(list.mark_read("a"));
        assert_invariant(&list);
        // Marking an already-read entry changes nothing.
        assert!(!list.mark_read("a"));
        assert!(!list.mark_read("missing"));
        assert_invariant(&list);

        let removed = list.remove("c").unwrap();
        assert!(!removed.is_read);
        assert_invariant(&list);

        list.mark_all_read();
        assert_invariant(&list);
        assert_eq!(list.unread_count(), 0);
    }

    #[tokio::test]
    async fn push_then_mark_as_read_scenario() {
        let (hub, _session) = offline_hub().await;

        hub.add_notification(notification("n1", false, 0));
        let after_push = hub.unread_count();
        assert_eq!(after_push, 1);
        assert_invariant(&hub.snapshot());

        // The confirming REST call fails (offline), but the optimistic
        // update stands; recovery is a later resync.
        hub.mark_as_read("n1").await.unwrap_err();

        let snapshot = hub.snapshot();
        let n1 = snapshot.items().iter().find(|n| n.id == "n1").unwrap();
        assert!(n1.is_read);
        assert_eq!(snapshot.unread_count(), after_push - 1);
        assert_invariant(&snapshot);
    }

    #[tokio::test]
    async fn mark_all_as_read_is_idempotent() {
        let (hub, _session) = offline_hub().await;
        hub.add_notification(notification("a", false, 2));
        hub.add_notification(notification("b", false, 1));
        hub.add_notification(notification("c", true, 0));

        hub.mark_all_as_read().await.unwrap_err();
        assert_eq!(hub.unread_count(), 0);
        let first = hub.snapshot();
        assert_invariant(&first);

        hub.mark_all_as_read().await.unwrap_err();
        assert_eq!(hub.unread_count(), 0);
        let second = hub.snapshot();
        assert_eq!(first, second, "second call must not change the list");
    }

    #[tokio::test]
    async fn delete_adjusts_unread_count_only_for_unread_entries() {
        let (hub, _session) = offline_hub().await;
        hub.add_notification(notification("u", false, 1));
        hub.add_notification(notification("r", true, 0));
        assert_eq!(hub.unread_count(), 1);

        hub.delete_notification("r").await.unwrap_err();
        assert_eq!(hub.unread_count(), 1);
        assert_invariant(&hub.snapshot());

        hub.delete_notification("u").await.unwrap_err();
        assert_eq!(hub.unread_count(), 0);
        assert_eq!(hub.notifications().len(), 0);
    }

    #[tokio::test]
    async fn permission_is_prompted_at_most_once() {
        let (_offline, session) = offline_hub().await;
        let notifier = TestNotifier::new(NotificationPermission::Denied);
        let hub = Arc::new(
            NotificationHub::new(
                ApiClient::new(session.clone()),
                session.clone(),
                "ws://localhost:1",
            )
            .with_notifier(notifier.clone()),
        );

        assert_eq!(hub.permission(), NotificationPermission::Default);
        assert_eq!(
            hub.request_notification_permission(),
            NotificationPermission::Denied
        );
        assert_eq!(
            hub.request_notification_permission(),
            NotificationPermission::Denied
        );
        assert_eq!(notifier.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn system_notifications_require_permission_and_settings() {
        let (_offline, session) = offline_hub().await;
        let notifier = TestNotifier::new(NotificationPermission::Granted);
        let mut settings = NotificationSettings::default();
        settings.job_match = false;

        let hub = Arc::new(
            NotificationHub::new(
                ApiClient::new(session.clone()),
                session.clone(),
                "ws://localhost:1",
            )
            .with_notifier(notifier.clone())
            .with_settings(settings),
        );

        // Permission still Default: nothing raised.
        hub.add_notification(notification("p1", false, 2));
        assert!(notifier.notified.lock().unwrap().is_empty());

        hub.request_notification_permission();

        // Granted, but the category is disabled.
        hub.add_notification(notification("p2", false, 1));
        assert!(notifier.notified.lock().unwrap().is_empty());

        // A category the settings allow goes through.
        let mut security = notification("p3", false, 0);
        security.r#type = NotificationType::Security;
        hub.add_notification(security);
        let raised = notifier.notified.lock().unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].0, "title p3");

        // State updated for all three regardless of delivery.
        assert_eq!(hub.unread_count(), 3);
    }

    #[tokio::test]
    async fn push_channel_delivers_reconnects_and_stops_on_logout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let accepted_srv = accepted.clone();

        // A server that pushes one notification on the first connection,
        // then closes every connection immediately.
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let n = accepted_srv.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    if n == 0 {
                        let payload =
                            serde_json::to_string(&notification("push-1", false, 0)).unwrap();
                        let _ = ws.send(Message::Text(payload.into())).await;
                    }
                    let _ = ws.close(None).await;
                });
            }
        });

        // REST side refuses connections; only the socket is live.
        let rest = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rest_addr = rest.local_addr().unwrap();
        drop(rest);

        let session = Arc::new(SessionStore::ephemeral());
        session.login(Session {
            token: "tok".to_string(),
            user_id: "u1".to_string(),
            role: "seeker".to_string(),
        });
        let client = ApiClient::new(session.clone()).with_base_url(format!("http://{rest_addr}"));
        let hub = Arc::new(
            NotificationHub::new(client, session.clone(), format!("ws://{ws_addr}"))
                .with_reconnect_config(ReconnectConfig {
                    max_attempts: 0,
                    initial_delay_ms: 50,
                    max_delay_ms: 50,
                    backoff_multiplier: 1.0,
                }),
        );
        hub.start();

        // The pushed notification lands in the store.
        let mut rx = hub.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow().items().iter().any(|n| n.id == "push-1") {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .expect("push message should reach the hub");
        assert_eq!(hub.unread_count(), 1);

        // The server closes each connection; the client keeps coming back.
        tokio::time::timeout(Duration::from_secs(5), async {
            while accepted.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("client should reconnect after close");

        // Logout ends the reconnect loop for good.
        session.logout();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let settled = accepted.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            accepted.load(Ordering::SeqCst),
            settled,
            "no reconnect attempts after logout"
        );
        assert_eq!(hub.connection_state(), ConnectionState::Closed);

        hub.stop();
    }
}

