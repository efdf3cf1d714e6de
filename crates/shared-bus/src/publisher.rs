//! # Event Publisher
//!
//! Publishing side of the ledger event bus.

use crate::client::{BusEventClient, EventClient, EventSource};
use crate::events::LedgerEvent;
use crate::subscriber::Subscription;
use crate::{BusError, DEFAULT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing ledger events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event, returning the number of subscribers that got it.
    async fn publish(&self, event: LedgerEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory ledger event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Delivery is at-least-once from the subscriber's point of view:
/// the ledger may republish a commit and handlers must tolerate it.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<LedgerEvent>,

    /// Set once the bus stops accepting connections.
    closed: Arc<AtomicBool>,

    events_published: AtomicU64,

    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }

    /// Refuse new connections. Existing clients keep running.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: LedgerEvent) -> usize {
        let kind = event.kind;
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(kind = ?kind, receivers = receiver_count, "Ledger event published");
                receiver_count
            }
            Err(e) => {
                warn!(kind = ?kind, error = %e, "Ledger event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl EventSource for InMemoryEventBus {
    fn connect(&self) -> Result<Arc<dyn EventClient>, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(Arc::new(BusEventClient::new(self.sender.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LedgerEventKind;

    fn event(height: u64) -> LedgerEvent {
        LedgerEvent {
            kind: LedgerEventKind::NetworkFeeCommitted,
            height,
            payload: vec![],
        }
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(event(1)).await, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe();

        assert_eq!(bus.publish(event(1)).await, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_connect_after_close_fails() {
        let bus = InMemoryEventBus::new();
        assert!(bus.connect().is_ok());

        bus.close();
        assert!(matches!(bus.connect(), Err(BusError::Closed)));
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
    }
}
