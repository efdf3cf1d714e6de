//! # Attestation Gossip
//!
//! Validator-side aggregation and dissemination of attestations for bridge
//! facts: observed transactions, network fees, solvency reports and errata.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      AttestationGossip                           │
//! │                                                                  │
//! │  ┌──────────────┐ ┌──────────────┐ ┌────────────┐ ┌───────────┐  │
//! │  │ ObservedTx   │ │ NetworkFee   │ │ Solvency   │ │ ErrataTx  │  │
//! │  │ states+pool  │ │ states+pool  │ │ states+pool│ │states+pool│  │
//! │  └──────┬───────┘ └──────┬───────┘ └─────┬──────┘ └─────┬─────┘  │
//! │         └────────────────┴───────┬───────┴──────────────┘        │
//! │                                  │                               │
//! │   reconcile loop ◄───────────────┼──────────► AttestationBatcher │
//! │   (expire, late send, tuning)    │            (PeerManager)      │
//! └──────────────────────────────────┼───────────────────────────────┘
//!            ▲                       │                    │
//!            │ commit events         │ submit             │ batches
//!     ┌──────┴──────┐         ┌──────▼──────┐      ┌──────▼──────┐
//!     │ EventSource │         │LedgerBridge │      │  PeerHost   │
//!     └─────────────┘         └─────────────┘      └─────────────┘
//! ```
//!
//! ## Fact Lifecycle
//!
//! `unseen → pending → committed → pooled`, with `pending → pooled` once
//! the non-quorum timeout passes. Committed facts stay tracked for the
//! late-observe window so late attestations still earn credit. A commit
//! seen before any gossip for its fact is held for that window and applied
//! when the fact first arrives, so the fact never reopens as pending.
//!
//! ## Wire Protocols
//!
//! See [`wire`]: a batched attestation stream for steady-state gossip and
//! a state snapshot stream for catch-up after a restart.

#![warn(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod batcher;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod wire;

pub use batcher::AttestationBatcher;
pub use config::GossipConfig;
pub use domain::{
    ActiveValidators, AttestationState, AttestationStatePool, PeerId, PeerManager, ValidatorSet,
};
pub use error::{GossipError, GossipResult};
pub use metrics::{GossipMetrics, MetricsSnapshot};
pub use ports::inbound::{AttestationGossipApi, CategoryCounts};
pub use ports::outbound::{
    stream_handler, KeyProvider, LedgerBridge, ObservationSink, PeerHost, PeerStream,
    StreamHandler,
};
pub use service::AttestationGossip;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
