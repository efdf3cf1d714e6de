//! # Error Types
//!
//! Errors raised by the attestation gossip subsystem.
//!
//! Construction errors (`MissingKey`, `LedgerConnection`) are fatal and
//! returned to the caller. Everything else occurs per message or per peer
//! and is logged and counted by the caller, never propagated out of the
//! reconcile loop or a stream handler.

use shared_bus::BusError;
use shared_types::FactError;
use thiserror::Error;

/// Errors that can occur in attestation gossip.
#[derive(Debug, Error)]
pub enum GossipError {
    /// Local signing key could not be loaded.
    #[error("Signing key unavailable: {0}")]
    MissingKey(String),

    /// Ledger-layer event source could not be reached.
    #[error("Ledger event source unreachable: {0}")]
    LedgerConnection(#[from] BusError),

    /// Stream open, read or write failed.
    #[error("Transport error with peer {peer}: {reason}")]
    Transport { peer: String, reason: String },

    /// Malformed payload.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Peer broke the framing or ack sequence.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// No concurrency slot for the peer within the timeout.
    #[error("Peer {0} busy")]
    PeerBusy(String),

    /// Operation exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Attestation signed by a key outside the validator set and keysign party.
    #[error("Attestation from non-validator {0}")]
    UnknownValidator(String),

    /// Signature or key failed verification.
    #[error("Invalid attestation: {0}")]
    InvalidAttestation(#[from] FactError),

    /// Ledger bridge call failed.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GossipError {
    pub(crate) fn transport(peer: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for GossipError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport {
            peer: "unknown".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<bincode::Error> for GossipError {
    fn from(e: bincode::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result type for gossip operations.
pub type GossipResult<T> = Result<T, GossipError>;
