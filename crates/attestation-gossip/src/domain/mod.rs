//! # Domain Layer
//!
//! Pure state for attestation tracking and peer governance. Nothing here
//! performs I/O.
//!
//! - `state` - `AttestationState<T>` and its pool
//! - `peer_manager` - per-peer concurrency governor
//! - `validators` - peer ids and the copy-on-write active validator set
//! - `keysign_cache` - TTL cache of keysign parties

pub mod keysign_cache;
pub mod peer_manager;
pub mod state;
pub mod validators;

pub use keysign_cache::KeysignPartyCache;
pub use peer_manager::PeerManager;
pub use state::{AttestationState, AttestationStatePool, MAX_POOLED_STATES};
pub use validators::{ActiveValidators, PeerId, ValidatorSet};
