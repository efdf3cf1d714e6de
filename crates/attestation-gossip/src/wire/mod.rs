//! # Wire Protocols
//!
//! Framing this subsystem imposes on top of peer streams. Two protocols:
//!
//! - **State snapshot** ([`STATE_PROTOCOL`]): a restarted validator requests
//!   every pending fact a peer holds, streamed back in acknowledged batches.
//! - **Batched attestations** ([`BATCH_PROTOCOL`]): one stream per flushed
//!   batch, carrying a single frame.
//!
//! Every message is a frame: a 4-byte big-endian length followed by that
//! many bytes, capped at [`MAX_FRAME_SIZE`].

pub mod batch;
pub mod frame;
pub mod state_sync;

pub use batch::{read_batch, write_batch};
pub use frame::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use state_sync::{request_state, serve_state};

pub const STATE_PROTOCOL: &str = "/p2p/attestation-state/v2";
pub const BATCH_PROTOCOL: &str = "/p2p/batched-attestations";

/// Facts per data frame in a state dump.
pub const MAX_QUORUM_TXS_PER_BATCH: usize = 100;

/// Facts in one whole state dump. A responder serves at most this many and
/// a requester aborts a dump that goes past it.
pub const MAX_STATE_DUMP_FACTS: usize = 100 * MAX_QUORUM_TXS_PER_BATCH;
