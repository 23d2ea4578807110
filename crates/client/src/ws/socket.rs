//! The connection loop behind the push channel.

use std::sync::Arc;

use futures_util::StreamExt;
use jobdash_shared::Notification;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ConnectionState, ReconnectConfig};

/// Start the connection management loop in a background task.
///
/// The loop runs until the authenticated signal goes false, its sender is
/// dropped, the attempt budget is exhausted, or the returned handle is
/// aborted. Teardown is exact: leaving the loop closes the socket and no
/// further reconnect attempts fire.
pub(crate) fn spawn_socket_loop(
    url_builder: Arc<dyn Fn() -> Option<String> + Send + Sync>,
    on_notification: Arc<dyn Fn(Notification) + Send + Sync>,
    state: watch::Sender<ConnectionState>,
    mut authed: watch::Receiver<bool>,
    config: ReconnectConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut attempt = 0u32;

        loop {
            if !*authed.borrow() {
                let _ = state.send(ConnectionState::Closed);
                return;
            }

            let Some(url) = url_builder() else {
                // No URL available (probably no token yet); retry after the
                // usual delay.
                let _ = state.send(ConnectionState::Closed);
                if wait_or_deauth(&mut authed, config.delay_for_attempt(attempt)).await {
                    let _ = state.send(ConnectionState::Closed);
                    return;
                }
                continue;
            };

            let _ = state.send(ConnectionState::Connecting);

            match connect_async(&url).await {
                Ok((ws_stream, _response)) => {
                    let _ = state.send(ConnectionState::Open);
                    attempt = 0;
                    tracing::info!("notification socket connected");

                    let (_write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            message = read.next() => match message {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<Notification>(text.as_str()) {
                                        Ok(notification) => on_notification(notification),
                                        Err(e) => {
                                            tracing::error!("failed to parse push message: {}", e)
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    tracing::info!("notification socket received close frame");
                                    break;
                                }
                                Some(Ok(Message::Ping(_))) => {
                                    // Pong is handled automatically by tungstenite
                                }
                                Some(Ok(_)) => {
                                    // Ignore binary, pong, etc.
                                }
                                Some(Err(e)) => {
                                    tracing::error!("notification socket read error: {}", e);
                                    break;
                                }
                                None => break,
                            },
                            changed = authed.changed() => {
                                if changed.is_err() || !*authed.borrow_and_update() {
                                    tracing::info!("notification socket closing: session ended");
                                    let _ = state.send(ConnectionState::Closed);
                                    return;
                                }
                            }
                        }
                    }

                    let _ = state.send(ConnectionState::Closed);
                }
                Err(e) => {
                    tracing::error!("notification socket connect failed: {}", e);
                    let _ = state.send(ConnectionState::Closed);
                }
            }

            if config.max_attempts > 0 && attempt >= config.max_attempts {
                tracing::warn!(
                    "notification socket giving up after {} attempts",
                    config.max_attempts
                );
                return;
            }

            let delay = config.delay_for_attempt(attempt);
            attempt += 1;
            tracing::info!("reconnecting notification socket in {}ms", delay);
            if wait_or_deauth(&mut authed, delay).await {
                let _ = state.send(ConnectionState::Closed);
                return;
            }
        }
    })
}

/// Sleep for `delay_ms`, returning early with `true` if the authenticated
/// signal goes false (or its sender is gone) in the meantime.
async fn wait_or_deauth(authed: &mut watch::Receiver<bool>, delay_ms: u32) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms as u64)) => false,
        result = authed.wait_for(|a| !*a) => {
            let _ = result;
            true
        }
    }
}
