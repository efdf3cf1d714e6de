//! # Attestation Batcher
//!
//! Decouples "an attestation is ready" from "bytes go on the wire".
//!
//! ```text
//! enqueue(fact) ──► per-peer queue ──► flush ──► send task ──► BATCH_PROTOCOL stream
//!   (targets =        (cap 10x max)     │          (PeerManager slot)
//!    active set                         ├─ queue reached max batch size
//!    at enqueue)                        └─ oldest item older than batch interval
//! ```
//!
//! A send that cannot get a peer slot within the peer timeout puts its items
//! back at the front of the queue, due on the next flush. Transport failures
//! are logged and the batch is dropped; the reconcile loop's late re-sends
//! and the state catch-up cover what was lost.

use parking_lot::Mutex;
use shared_types::AttestedFact;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{GossipConfig, PEER_IDLE_TIMEOUT};
use crate::domain::{ActiveValidators, PeerId, PeerManager};
use crate::error::GossipResult;
use crate::metrics::GossipMetrics;
use crate::ports::outbound::PeerHost;
use crate::wire::{write_batch, BATCH_PROTOCOL};

/// Queue bound per peer, in multiples of the max batch size.
const QUEUE_CAPACITY_FACTOR: usize = 10;

#[derive(Default)]
struct PeerQueue {
    items: VecDeque<AttestedFact>,
    /// Enqueue time of the oldest unflushed item.
    oldest: Option<Instant>,
}

/// Per-peer batching of outgoing attestations.
pub struct AttestationBatcher {
    host: Arc<dyn PeerHost>,
    validators: Arc<ActiveValidators>,
    metrics: Arc<GossipMetrics>,
    peers: PeerManager,
    max_batch_size: AtomicUsize,
    batch_interval: Duration,
    peer_timeout: Duration,
    queues: Mutex<HashMap<PeerId, PeerQueue>>,
    ready: Notify,
}

impl AttestationBatcher {
    #[must_use]
    pub fn new(
        host: Arc<dyn PeerHost>,
        validators: Arc<ActiveValidators>,
        metrics: Arc<GossipMetrics>,
        config: &GossipConfig,
    ) -> Self {
        Self {
            host,
            validators,
            metrics,
            peers: PeerManager::new("sends", config.peer_concurrent_sends, PEER_IDLE_TIMEOUT),
            max_batch_size: AtomicUsize::new(config.max_batch_size.max(1)),
            batch_interval: config.batch_interval,
            peer_timeout: config.peer_timeout,
            queues: Mutex::new(HashMap::new()),
            ready: Notify::new(),
        }
    }

    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.load(Ordering::SeqCst)
    }

    pub fn set_max_batch_size(&self, size: usize) {
        let size = size.max(1);
        let previous = self.max_batch_size.swap(size, Ordering::SeqCst);
        if previous != size {
            info!(previous, size, "Max batch size updated");
        }
    }

    /// Governor for outbound sends. Concurrency changes go through here.
    #[must_use]
    pub fn peer_manager(&self) -> &PeerManager {
        &self.peers
    }

    /// Items waiting for `peer`.
    #[must_use]
    pub fn pending(&self, peer: &PeerId) -> usize {
        self.queues.lock().get(peer).map_or(0, |q| q.items.len())
    }

    /// Queue `fact` for every active validator except this node.
    ///
    /// Targets are fixed here; later validator churn does not affect items
    /// already queued.
    pub fn enqueue(&self, fact: AttestedFact) {
        let targets = self.validators.snapshot();
        let local = self.host.local_peer_id();
        let max = self.max_batch_size();
        let capacity = max.saturating_mul(QUEUE_CAPACITY_FACTOR);
        let now = Instant::now();

        let mut full = false;
        let mut dropped = 0u64;
        {
            let mut queues = self.queues.lock();
            for peer in targets.peers().filter(|p| **p != local) {
                let queue = queues.entry(*peer).or_default();
                queue.items.push_back(fact.clone());
                queue.oldest.get_or_insert(now);
                while queue.items.len() > capacity {
                    queue.items.pop_front();
                    dropped += 1;
                }
                full |= queue.items.len() >= max;
            }
        }

        if dropped > 0 {
            warn!(dropped, "Batch queue overflow, dropped oldest attestations");
            self.metrics.record_batch_items_dropped(dropped);
        }
        if full {
            self.ready.notify_one();
        }
    }

    /// Flush loop. Exits when `shutdown` flips to `true` or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let tick = (self.batch_interval / 4).max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.ready.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            self.flush(Instant::now());
        }
        debug!("Batcher stopped");
    }

    /// Take every due batch and spawn a send for each. Returns how many
    /// batches were started.
    pub fn flush(self: &Arc<Self>, now: Instant) -> usize {
        let max = self.max_batch_size();
        let mut due = Vec::new();
        {
            let mut queues = self.queues.lock();
            for (peer, queue) in queues.iter_mut() {
                let elapsed = queue
                    .oldest
                    .is_some_and(|t| now.saturating_duration_since(t) >= self.batch_interval);

                let take = if elapsed {
                    queue.items.len()
                } else if queue.items.len() >= max {
                    queue.items.len() - queue.items.len() % max
                } else {
                    0
                };
                if take == 0 {
                    continue;
                }

                let drained: Vec<AttestedFact> = queue.items.drain(..take).collect();
                queue.oldest = if queue.items.is_empty() { None } else { Some(now) };
                for chunk in drained.chunks(max) {
                    due.push((*peer, chunk.to_vec()));
                }
            }
            queues.retain(|_, q| !q.items.is_empty());
        }

        let started = due.len();
        for (peer, batch) in due {
            let batcher = Arc::clone(self);
            tokio::spawn(async move { batcher.send_batch(peer, batch).await });
        }
        started
    }

    async fn send_batch(&self, peer: PeerId, batch: Vec<AttestedFact>) {
        let _permit = match self.peers.acquire(peer, self.peer_timeout).await {
            Ok(permit) => permit,
            Err(e) => {
                debug!(peer = %peer, items = batch.len(), error = %e, "Send slot unavailable, requeueing");
                self.requeue(peer, batch);
                return;
            }
        };

        match self.deliver(peer, &batch).await {
            Ok(()) => {
                debug!(peer = %peer, items = batch.len(), "Batch sent");
                self.metrics.record_batch_sent();
            }
            Err(e) => {
                warn!(peer = %peer, items = batch.len(), error = %e, "Batch send failed");
                self.metrics.record_batch_failed();
            }
        }
    }

    async fn deliver(&self, peer: PeerId, batch: &[AttestedFact]) -> GossipResult<()> {
        let mut stream = self.host.open_stream(peer, BATCH_PROTOCOL).await?;
        write_batch(&mut stream, batch, self.peer_timeout).await
    }

    fn requeue(&self, peer: PeerId, batch: Vec<AttestedFact>) {
        let now = Instant::now();
        let capacity = self.max_batch_size().saturating_mul(QUEUE_CAPACITY_FACTOR);
        let mut dropped = 0u64;
        {
            let mut queues = self.queues.lock();
            let queue = queues.entry(peer).or_default();
            for fact in batch.into_iter().rev() {
                queue.items.push_front(fact);
            }
            while queue.items.len() > capacity {
                queue.items.pop_front();
                dropped += 1;
            }
            // Due again on the next flush.
            queue.oldest = Some(now.checked_sub(self.batch_interval).unwrap_or(now));
        }
        if dropped > 0 {
            self.metrics.record_batch_items_dropped(dropped);
        }
    }
}
