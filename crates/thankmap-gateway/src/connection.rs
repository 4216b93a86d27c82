use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use thankmap_db::models::GratitudeRow;
use thankmap_types::events::{GatewayCommand, GatewayEvent};
use thankmap_types::models::{Gratitude, MapBounds};

use crate::Gateway;
use crate::submit::{self, SubmitError};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Replies waiting for a client that isn't reading are dropped past this.
const REPLY_QUEUE_DEPTH: usize = 32;

/// Drive one WebSocket connection until either side goes away.
pub async fn handle_connection(socket: WebSocket, gateway: Gateway, client_ip: IpAddr) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = gateway.dispatcher.register(client_ip).await;
    info!("{} ({}) connected to gateway", conn_id, client_ip);

    // Subscribe before loading history so a blink posted in between isn't lost
    let mut broadcast_rx = gateway.dispatcher.subscribe();

    match load_recent(&gateway).await {
        Ok(history) => {
            if history.is_empty() {
                debug!("{} history is empty", conn_id);
            }
            if send_event(&mut sender, &GatewayEvent::InitialData(history)).await.is_err() {
                gateway.dispatcher.unregister(conn_id).await;
                return;
            }
        }
        Err(e) => error!("Database read error while loading history: {:#}", e),
    }

    // Events addressed to this connection only (replies, warnings)
    let (reply_tx, mut reply_rx) = mpsc::channel::<GatewayEvent>(REPLY_QUEUE_DEPTH);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + replies -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let frame = match result {
                        Ok(frame) => frame,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("{} broadcast receiver lagged by {} messages", conn_id, n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                result = reply_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("{} heartbeat timeout (missed {} pongs), dropping connection", conn_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_gateway, conn_id, client_ip, cmd, &reply_tx).await;
                    }
                    Err(e) => {
                        // Malformed input is dropped without telling the client
                        debug!(
                            "{} ({}) bad command: {} -- raw: {}",
                            conn_id,
                            client_ip,
                            e,
                            truncate(&text, 200)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    gateway.dispatcher.unregister(conn_id).await;
    info!("{} ({}) disconnected from gateway", conn_id, client_ip);
}

async fn handle_command(
    gateway: &Gateway,
    conn_id: Uuid,
    client_ip: IpAddr,
    cmd: GatewayCommand,
    reply: &mpsc::Sender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::MapBounds(bounds) => {
            handle_map_bounds(gateway, conn_id, bounds, reply).await;
        }

        GatewayCommand::SubmitGratitude(submission) => {
            match submit::submit(gateway, client_ip, submission).await {
                Ok(accepted) => {
                    info!(
                        "{} ({}) posted gratitude {} [{}]",
                        conn_id, client_ip, accepted.blink.id, accepted.blink.short_code
                    );
                    queue_reply(reply, conn_id, GatewayEvent::UploadSuccess { link: accepted.link });
                    gateway.dispatcher.broadcast(&GatewayEvent::NewBlink(accepted.blink));
                }
                Err(SubmitError::Rejected(rejection)) => match rejection.user_message() {
                    Some(text) => {
                        info!("{} ({}) submission refused: {}", conn_id, client_ip, rejection);
                        queue_reply(reply, conn_id, GatewayEvent::ErrorMsg(text));
                    }
                    None => debug!("{} ({}) submission dropped: {}", conn_id, client_ip, rejection),
                },
                Err(e @ SubmitError::Storage(_)) => {
                    error!("{} ({}) {}", conn_id, client_ip, e);
                }
            }
        }
    }
}

async fn handle_map_bounds(
    gateway: &Gateway,
    conn_id: Uuid,
    bounds: MapBounds,
    reply: &mpsc::Sender<GatewayEvent>,
) {
    let Some(view) = bounds.to_view() else {
        debug!("{} ignoring unusable map bounds {:?}", conn_id, bounds);
        return;
    };

    debug!(
        "{} fetching dots for view [{}, {}] to [{}, {}]",
        conn_id, view.west, view.south, view.east, view.north
    );

    let db = gateway.db.clone();
    let limit = gateway.settings.max_results;
    let result = tokio::task::spawn_blocking(move || db.gratitudes_in_view(&view, limit))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))
        .and_then(|r| r);

    match result {
        Ok(rows) => {
            queue_reply(reply, conn_id, GatewayEvent::UpdateMapDots(into_models(rows)));
        }
        Err(e) => error!("{} error fetching view dots: {:#}", conn_id, e),
    }
}

/// Queue an event for this connection only. Delivery is best-effort: when
/// the client has stopped reading and the queue is full, the event is dropped.
fn queue_reply(reply: &mpsc::Sender<GatewayEvent>, conn_id: Uuid, event: GatewayEvent) -> bool {
    match reply.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("{} reply queue full, dropping {}", conn_id, event.name());
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

async fn load_recent(gateway: &Gateway) -> anyhow::Result<Vec<Gratitude>> {
    let db = gateway.db.clone();
    let limit = gateway.settings.max_results;
    let rows = tokio::task::spawn_blocking(move || db.recent_gratitudes(limit)).await??;
    Ok(into_models(rows))
}

fn into_models(rows: Vec<GratitudeRow>) -> Vec<Gratitude> {
    rows.into_iter().map(GratitudeRow::into_gratitude).collect()
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize {} event: {}", event.name(), e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn replies_past_queue_depth_are_dropped() {
        let (tx, mut rx) = mpsc::channel::<GatewayEvent>(2);
        let conn_id = Uuid::new_v4();

        assert!(queue_reply(&tx, conn_id, GatewayEvent::ErrorMsg("one".into())));
        assert!(queue_reply(&tx, conn_id, GatewayEvent::ErrorMsg("two".into())));
        assert!(!queue_reply(&tx, conn_id, GatewayEvent::ErrorMsg("three".into())));

        assert_eq!(rx.try_recv().unwrap(), GatewayEvent::ErrorMsg("one".into()));
        assert_eq!(rx.try_recv().unwrap(), GatewayEvent::ErrorMsg("two".into()));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!queue_reply(&tx, conn_id, GatewayEvent::ErrorMsg("closed".into())));
    }
}
