//! # Shared Types Crate
//!
//! Fact payloads, attestation proofs and the quorum envelope shared by the
//! attestation gossip subsystem, the ledger bridge and the node runtime.
//!
//! ## Design Principles
//!
//! - **One generic envelope**: every category travels as `Quorum<T>`, wrapped
//!   in `AttestedFact` on the wire.
//! - **Canonical signing bytes**: attestations sign the bincode encoding of
//!   the fact, so every validator derives identical bytes.
//! - **Stable keys**: `Attestable::fact_key` never depends on the attestations.

pub mod attestation;
pub mod entities;
pub mod errors;

pub use attestation::*;
pub use entities::*;
pub use errors::*;
