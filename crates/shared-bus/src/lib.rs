//! # Shared Bus - Ledger Event Source
//!
//! Delivers "fact committed" notifications from the ledger layer to the
//! attestation gossip subsystem.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐   dispatch   ┌──────────────┐
//! │ Ledger layer │ ────────────► │  Event Bus   │ ───────────► │ EventClient  │
//! └──────────────┘               └──────────────┘              │  handlers    │
//!                                                              └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! - At-least-once: the ledger may republish, handlers must be idempotent.
//! - Events published before a client is started are not replayed.
//! - `EventClient::stop` waits for the dispatch task to exit.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use client::{BusEventClient, EventClient, EventHandler, EventSource};
pub use events::{LedgerEvent, LedgerEventKind};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

use thiserror::Error;

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Errors from the event source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The source no longer accepts connections.
    #[error("Event source closed")]
    Closed,

    /// `start` called on a running client.
    #[error("Event client already started")]
    AlreadyStarted,

    /// Payload could not be encoded or decoded.
    #[error("Event payload encoding: {0}")]
    Encoding(String),
}
