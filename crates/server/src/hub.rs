//! WebSocket broadcast hub.
//!
//! A registry of live outbound connections. Each registered connection is an
//! unbounded sender feeding that client's forward task; the hub owns the only
//! strong reference. Broadcast serializes the event once and walks the
//! registry; any send failure means the peer's forward task is gone, and the
//! connection is silently pruned so one dead peer never affects the rest.
//!
//! The hub is built once per process, after the transport exists, while
//! request handlers and the scheduler are built earlier. [`install`] and
//! [`global`] are the set-once indirection that lets both sides bind late.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use upkeep_core::MaintenanceAlert;

// ── Event envelope ──────────────────────────────────────────────────

/// Closed set of event kinds the engine emits. Client `ping` frames are
/// matched as raw text in the socket handler, not through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConnectionEstablished,
    Pong,
    UpcomingMaintenanceAlerts,
}

/// One JSON envelope per event: `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize)]
pub struct WsEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WsEvent {
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now(),
        }
    }

    fn to_message(&self) -> Message {
        Message::Text(serde_json::to_string(self).unwrap_or_default().into())
    }
}

// ── Hub ─────────────────────────────────────────────────────────────

pub type ConnectionId = u64;

#[derive(Default)]
pub struct BroadcastHub {
    clients: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live connection; the returned id is the unregistration handle.
    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients
            .lock()
            .expect("hub lock poisoned")
            .insert(id, sender);
        debug!(connection_id = id, "websocket connection registered");
        id
    }

    /// Remove a connection. Removing an unknown id is a no-op.
    pub fn unregister(&self, id: ConnectionId) {
        if self
            .clients
            .lock()
            .expect("hub lock poisoned")
            .remove(&id)
            .is_some()
        {
            debug!(connection_id = id, "websocket connection unregistered");
        }
    }

    /// Send one event to one connection. Returns false and prunes the
    /// connection when its forward task is gone.
    pub fn send_to(&self, id: ConnectionId, event: &WsEvent) -> bool {
        let mut clients = self.clients.lock().expect("hub lock poisoned");
        let delivered = match clients.get(&id) {
            Some(sender) => sender.send(event.to_message()).is_ok(),
            None => false,
        };
        if !delivered {
            clients.remove(&id);
        }
        delivered
    }

    /// Fan one event out to every registered connection, serializing once.
    /// Dead peers are pruned silently; returns the delivered count.
    pub fn broadcast(&self, event: &WsEvent) -> usize {
        let message = event.to_message();
        let mut clients = self.clients.lock().expect("hub lock poisoned");
        let mut dead = Vec::new();

        for (id, sender) in clients.iter() {
            if sender.send(message.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in &dead {
            clients.remove(id);
            debug!(connection_id = id, "pruned dead websocket connection");
        }

        clients.len()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.lock().expect("hub lock poisoned").len()
    }

    /// Ask every client to close, then drop the registry.
    pub fn close_all(&self) {
        let mut clients = self.clients.lock().expect("hub lock poisoned");
        for (_, sender) in clients.iter() {
            let _ = sender.send(Message::Close(None));
        }
        clients.clear();
    }
}

// ── Process-wide accessor ───────────────────────────────────────────

static HUB: OnceLock<std::sync::Arc<BroadcastHub>> = OnceLock::new();

/// Install the process-wide hub. Only the first call wins; later calls are
/// ignored with a warning (the hub is constructed once per process).
pub fn install(hub: std::sync::Arc<BroadcastHub>) {
    if HUB.set(hub).is_err() {
        warn!("broadcast hub already installed, ignoring replacement");
    }
}

/// The installed hub, if startup has reached that point yet.
pub fn global() -> Option<std::sync::Arc<BroadcastHub>> {
    HUB.get().cloned()
}

// ── Broadcast helper ────────────────────────────────────────────────
//
// No-op before the hub is installed, mirroring the late-binding contract:
// callers constructed early must be able to call this unconditionally.

/// Batched "new maintenance alerts" event, sent when a scan finds >= 1.
pub fn broadcast_maintenance_alerts(alerts: &[MaintenanceAlert]) {
    if let Some(hub) = global() {
        let event = WsEvent::new(
            EventType::UpcomingMaintenanceAlerts,
            serde_json::json!({ "alerts": alerts, "count": alerts.len() }),
        );
        let delivered = hub.broadcast(&event);
        debug!(alerts = alerts.len(), connections = delivered, "maintenance alerts broadcast");
    }
}

// ── Tests ───────────────────────────────────────────────────────────
