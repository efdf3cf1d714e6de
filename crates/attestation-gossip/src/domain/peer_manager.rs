//! # Peer Manager
//!
//! Per-peer concurrency governor. Each remote peer gets its own counting
//! semaphore, created on first use, so a single slow or hostile peer can
//! only tie up its own slots.
//!
//! Changing the limit swaps in a fresh semaphore for each peer on its next
//! acquisition. Permits already handed out belong to the old semaphore and
//! are released there, so in-flight work is unaffected.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use super::validators::PeerId;
use crate::error::{GossipError, GossipResult};

struct PeerSlot {
    semaphore: Arc<Semaphore>,
    limit: usize,
    last_used: Instant,
}

/// Bounds concurrent streams per peer.
pub struct PeerManager {
    name: &'static str,
    limit: AtomicUsize,
    idle_timeout: Duration,
    peers: Mutex<HashMap<PeerId, PeerSlot>>,
}

impl PeerManager {
    /// `name` only labels log lines ("sends" / "receives").
    #[must_use]
    pub fn new(name: &'static str, limit: usize, idle_timeout: Duration) -> Self {
        Self {
            name,
            limit: AtomicUsize::new(limit.max(1)),
            idle_timeout,
            peers: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// Change the bound for future acquisitions.
    pub fn update_limit(&self, limit: usize) {
        let limit = limit.max(1);
        let previous = self.limit.swap(limit, Ordering::SeqCst);
        if previous != limit {
            debug!(manager = self.name, previous, limit, "Peer concurrency limit updated");
        }
    }

    /// Wait up to `timeout` for a slot with `peer`.
    pub async fn acquire(&self, peer: PeerId, timeout: Duration) -> GossipResult<OwnedSemaphorePermit> {
        let semaphore = {
            let limit = self.limit();
            let mut peers = self.peers.lock();
            let slot = peers.entry(peer).or_insert_with(|| PeerSlot {
                semaphore: Arc::new(Semaphore::new(limit)),
                limit,
                last_used: Instant::now(),
            });
            if slot.limit != limit {
                slot.semaphore = Arc::new(Semaphore::new(limit));
                slot.limit = limit;
            }
            slot.last_used = Instant::now();
            slot.semaphore.clone()
        };

        match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) | Err(_) => {
                debug!(manager = self.name, peer = %peer, "No peer slot within timeout");
                Err(GossipError::PeerBusy(peer.to_string()))
            }
        }
    }

    /// Drop slots that are idle and have no permits outstanding.
    ///
    /// Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let mut peers = self.peers.lock();
        let before = peers.len();
        peers.retain(|_, slot| {
            // An outstanding permit or a pending acquire holds a clone.
            let in_use = Arc::strong_count(&slot.semaphore) > 1;
            in_use || now.saturating_duration_since(slot.last_used) <= self.idle_timeout
        });
        let removed = before - peers.len();
        if removed > 0 {
            debug!(manager = self.name, removed, remaining = peers.len(), "Pruned idle peer slots");
        }
        removed
    }

    /// Number of tracked peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Free slots for `peer` under the current limit.
    #[must_use]
    pub fn available(&self, peer: &PeerId) -> usize {
        let limit = self.limit();
        match self.peers.lock().get(peer) {
            Some(slot) if slot.limit == limit => slot.semaphore.available_permits(),
            _ => limit,
        }
    }
}
