//! # Attestation Gossip Configuration
//!
//! Durations are written in milliseconds when deserialized. Any field left at
//! zero is replaced by its default in [`GossipConfig::normalize`], which also
//! enforces the receive floor: a peer never accepts fewer concurrent inbound
//! streams than it opens outbound.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// How long after commit a validator can still get credit for attesting.
pub const DEFAULT_LATE_OBSERVE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Uncommitted candidates are dropped after this long. Covers chain halts.
pub const DEFAULT_NON_QUORUM_TIMEOUT: Duration = Duration::from_secs(10 * 60 * 60);

/// Minimum spacing between ledger submissions for one candidate.
pub const DEFAULT_MIN_TIME_BETWEEN_ATTESTATIONS: Duration = Duration::from_secs(30);

/// Should be at most half of both the late-observe timeout and the minimum
/// time between attestations.
pub const DEFAULT_OBSERVE_RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

pub const DEFAULT_ASK_PEERS: usize = 3;
pub const DEFAULT_ASK_PEERS_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_PEER_CONCURRENT_SENDS: usize = 4;
pub const DEFAULT_PEER_CONCURRENT_RECEIVES: usize = 5;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Keysign parties are re-fetched from the ledger after this long.
pub const KEYSIGN_PARTY_TTL: Duration = Duration::from_secs(60);

/// How often idle per-peer semaphores are pruned.
pub const SEMAPHORE_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// A per-peer semaphore with no permits out is idle after this long.
pub const PEER_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Names of the dynamic network parameters polled on every reconcile tick.
pub mod params {
    pub const MAX_BATCH_SIZE: &str = "MaxBatchSize";
    pub const PEER_CONCURRENT_SENDS: &str = "PeerConcurrentSends";
    pub const PEER_CONCURRENT_RECEIVES: &str = "PeerConcurrentReceives";
}

/// Attestation gossip settings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub observe_reconcile_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub late_observe_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub non_quorum_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub min_time_between_attestations: Duration,
    /// Random peers asked for their state on startup.
    pub ask_peers: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub ask_peers_delay: Duration,
    /// Bound on slot acquisition and on each stream exchange with a peer.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub peer_timeout: Duration,
    pub max_batch_size: usize,
    pub peer_concurrent_sends: usize,
    pub peer_concurrent_receives: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub batch_interval: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            observe_reconcile_interval: DEFAULT_OBSERVE_RECONCILE_INTERVAL,
            late_observe_timeout: DEFAULT_LATE_OBSERVE_TIMEOUT,
            non_quorum_timeout: DEFAULT_NON_QUORUM_TIMEOUT,
            min_time_between_attestations: DEFAULT_MIN_TIME_BETWEEN_ATTESTATIONS,
            ask_peers: DEFAULT_ASK_PEERS,
            ask_peers_delay: DEFAULT_ASK_PEERS_DELAY,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            peer_concurrent_sends: DEFAULT_PEER_CONCURRENT_SENDS,
            peer_concurrent_receives: DEFAULT_PEER_CONCURRENT_RECEIVES,
            batch_interval: DEFAULT_BATCH_INTERVAL,
        }
    }
}

impl GossipConfig {
    /// Short timings for tests and local devnets.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            observe_reconcile_interval: Duration::from_millis(100),
            late_observe_timeout: Duration::from_millis(400),
            non_quorum_timeout: Duration::from_secs(5),
            min_time_between_attestations: Duration::from_millis(200),
            ask_peers: DEFAULT_ASK_PEERS,
            ask_peers_delay: Duration::from_millis(50),
            peer_timeout: Duration::from_secs(1),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            peer_concurrent_sends: DEFAULT_PEER_CONCURRENT_SENDS,
            peer_concurrent_receives: DEFAULT_PEER_CONCURRENT_RECEIVES,
            batch_interval: Duration::from_millis(20),
        }
    }

    /// Replace zero fields with defaults and apply the receive floor.
    pub fn normalize(&mut self) {
        fn or_default_duration(value: &mut Duration, default: Duration) {
            if value.is_zero() {
                *value = default;
            }
        }
        fn or_default_count(value: &mut usize, default: usize) {
            if *value == 0 {
                *value = default;
            }
        }

        or_default_duration(
            &mut self.observe_reconcile_interval,
            DEFAULT_OBSERVE_RECONCILE_INTERVAL,
        );
        or_default_duration(&mut self.late_observe_timeout, DEFAULT_LATE_OBSERVE_TIMEOUT);
        or_default_duration(&mut self.non_quorum_timeout, DEFAULT_NON_QUORUM_TIMEOUT);
        or_default_duration(
            &mut self.min_time_between_attestations,
            DEFAULT_MIN_TIME_BETWEEN_ATTESTATIONS,
        );
        or_default_count(&mut self.ask_peers, DEFAULT_ASK_PEERS);
        or_default_duration(&mut self.ask_peers_delay, DEFAULT_ASK_PEERS_DELAY);
        or_default_duration(&mut self.peer_timeout, DEFAULT_PEER_TIMEOUT);
        or_default_count(&mut self.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        or_default_count(&mut self.peer_concurrent_sends, DEFAULT_PEER_CONCURRENT_SENDS);
        or_default_count(
            &mut self.peer_concurrent_receives,
            DEFAULT_PEER_CONCURRENT_RECEIVES,
        );
        if self.peer_concurrent_receives < self.peer_concurrent_sends {
            self.peer_concurrent_receives = self.peer_concurrent_sends;
        }
        or_default_duration(&mut self.batch_interval, DEFAULT_BATCH_INTERVAL);
    }

    /// Normalized copy.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}
