//! Audit event types, envelope, and event bus.
//!
//! Every container operation emits a [`ContainerEvent`] wrapped in an
//! [`EventEnvelope`] on a broadcast channel. Audit sinks (log shippers, the
//! host application's audit trail) subscribe independently. Emission never
//! fails: with no subscribers the event is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Event Envelope
// ============================================================================

/// Audit envelope around a [`ContainerEvent`].
///
/// ```text
/// {"event_id":"...","event_type":"container.viewed","occurred_at":"...",
///  "actor_id":"user-42","container_id":"...","payload":{...}}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"container.created"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Who caused this event, as passed by the caller.
    pub actor_id: String,
    /// Container the event relates to.
    pub container_id: Uuid,
    /// Domain-specific event data.
    pub payload: ContainerEvent,
}

impl EventEnvelope {
    /// Wrap an event for the given actor.
    pub fn new(actor_id: impl Into<String>, event: ContainerEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            actor_id: actor_id.into(),
            container_id: event.container_id(),
            payload: event,
        }
    }
}

// ============================================================================
// Container Event (domain payloads)
// ============================================================================

/// Container lifecycle and security events.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"ContainerViewed","container_id":"...","view_count":1}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ContainerEvent {
    /// A container was created and stored.
    ContainerCreated {
        container_id: Uuid,
        name: String,
        encrypted: bool,
        data_size: usize,
    },
    /// A read succeeded and a view was recorded.
    ContainerViewed {
        container_id: Uuid,
        view_count: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        views_remaining: Option<u32>,
    },
    /// The access policy refused a read.
    AccessDenied { container_id: Uuid, reason: String },
    /// Signature or checksum verification failed.
    TamperDetected { container_id: Uuid, reason: String },
    /// A container was imported from its exported form.
    ContainerImported { container_id: Uuid, name: String },
    /// A container was exported.
    ContainerExported { container_id: Uuid, size: usize },
    /// A container was removed from the store.
    ContainerDeleted { container_id: Uuid },
}

impl ContainerEvent {
    /// Namespaced event type for the envelope (e.g., `"container.viewed"`).
    pub fn event_type(&self) -> &'static str {
        match self {
            ContainerEvent::ContainerCreated { .. } => "container.created",
            ContainerEvent::ContainerViewed { .. } => "container.viewed",
            ContainerEvent::AccessDenied { .. } => "container.access_denied",
            ContainerEvent::TamperDetected { .. } => "container.tamper_detected",
            ContainerEvent::ContainerImported { .. } => "container.imported",
            ContainerEvent::ContainerExported { .. } => "container.exported",
            ContainerEvent::ContainerDeleted { .. } => "container.deleted",
        }
    }

    /// The container this event relates to.
    pub fn container_id(&self) -> Uuid {
        match self {
            ContainerEvent::ContainerCreated { container_id, .. }
            | ContainerEvent::ContainerViewed { container_id, .. }
            | ContainerEvent::AccessDenied { container_id, .. }
            | ContainerEvent::TamperDetected { container_id, .. }
            | ContainerEvent::ContainerImported { container_id, .. }
            | ContainerEvent::ContainerExported { container_id, .. }
            | ContainerEvent::ContainerDeleted { container_id } => *container_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for audit events.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, actor_id: &str, event: ContainerEvent) {
        let envelope = EventEnvelope::new(actor_id, event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            container_id = %envelope.container_id,
            actor_id = %envelope.actor_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
