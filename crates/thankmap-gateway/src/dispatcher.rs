use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error};
use uuid::Uuid;

use thankmap_types::events::GatewayEvent;

/// Manages all connected clients and broadcasts events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel of pre-serialized events; every connection receives every frame
    broadcast_tx: broadcast::Sender<Utf8Bytes>,

    /// Live connections: conn_id -> client IP
    connections: RwLock<HashMap<Uuid, IpAddr>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to broadcast frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Utf8Bytes> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. The event is serialized
    /// once and the frame shared between receivers.
    pub fn broadcast(&self, event: &GatewayEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };
        // No receivers just means nobody is connected.
        let _ = self.inner.broadcast_tx.send(Utf8Bytes::from(json));
    }

    /// Register a new connection. Returns its id.
    pub async fn register(&self, ip: IpAddr) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.connections.write().await.insert(conn_id, ip);
        conn_id
    }

    /// Forget a connection. Returns the IP it was registered under, if any.
    pub async fn unregister(&self, conn_id: Uuid) -> Option<IpAddr> {
        let mut connections = self.inner.connections.write().await;
        let ip = connections.remove(&conn_id);
        if let Some(ip) = ip {
            debug!("{} ({}) unregistered, {} connections open", conn_id, ip, connections.len());
        }
        ip
    }

    /// Number of open gateway connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
