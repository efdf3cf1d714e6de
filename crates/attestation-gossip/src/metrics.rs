//! # Gossip Metrics
//!
//! In-process counters for the gossip subsystem. With the `metrics` feature
//! each counter is mirrored to a registered Prometheus counter:
//!
//! ```toml
//! attestation-gossip = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `attestation_gossip_attestations_received_total`
//! - `attestation_gossip_attestations_rejected_total` (by reason)
//! - `attestation_gossip_batches_sent_total`
//! - `attestation_gossip_batches_failed_total`
//! - `attestation_gossip_batch_items_dropped_total`
//! - `attestation_gossip_ledger_submissions_total`
//! - `attestation_gossip_ledger_failures_total`
//! - `attestation_gossip_late_sends_total`
//! - `attestation_gossip_states_pruned_total`
//! - `attestation_gossip_state_sync_facts_total`

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
mod prom {
    use lazy_static::lazy_static;
    use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

    lazy_static! {
        pub static ref ATTESTATIONS_RECEIVED: IntCounter = register_int_counter!(
            "attestation_gossip_attestations_received_total",
            "Peer attestations accepted into local state"
        )
        .expect("Failed to create ATTESTATIONS_RECEIVED metric");

        pub static ref ATTESTATIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
            "attestation_gossip_attestations_rejected_total",
            "Peer attestations dropped",
            &["reason"]
        )
        .expect("Failed to create ATTESTATIONS_REJECTED metric");

        pub static ref BATCHES_SENT: IntCounter = register_int_counter!(
            "attestation_gossip_batches_sent_total",
            "Attestation batches delivered to peers"
        )
        .expect("Failed to create BATCHES_SENT metric");

        pub static ref BATCHES_FAILED: IntCounter = register_int_counter!(
            "attestation_gossip_batches_failed_total",
            "Attestation batches that failed to send"
        )
        .expect("Failed to create BATCHES_FAILED metric");

        pub static ref BATCH_ITEMS_DROPPED: IntCounter = register_int_counter!(
            "attestation_gossip_batch_items_dropped_total",
            "Queued attestations dropped on per-peer queue overflow"
        )
        .expect("Failed to create BATCH_ITEMS_DROPPED metric");

        pub static ref LEDGER_SUBMISSIONS: IntCounter = register_int_counter!(
            "attestation_gossip_ledger_submissions_total",
            "Attestation submissions to the ledger"
        )
        .expect("Failed to create LEDGER_SUBMISSIONS metric");

        pub static ref LEDGER_FAILURES: IntCounter = register_int_counter!(
            "attestation_gossip_ledger_failures_total",
            "Failed ledger submissions"
        )
        .expect("Failed to create LEDGER_FAILURES metric");

        pub static ref LATE_SENDS: IntCounter = register_int_counter!(
            "attestation_gossip_late_sends_total",
            "Late re-submissions from the reconcile loop"
        )
        .expect("Failed to create LATE_SENDS metric");

        pub static ref STATES_PRUNED: IntCounter = register_int_counter!(
            "attestation_gossip_states_pruned_total",
            "Attestation states expired and pooled"
        )
        .expect("Failed to create STATES_PRUNED metric");

        pub static ref STATE_SYNC_FACTS: IntCounter = register_int_counter!(
            "attestation_gossip_state_sync_facts_total",
            "Facts received through state catch-up"
        )
        .expect("Failed to create STATE_SYNC_FACTS metric");
    }
}

/// Counters for one gossip instance.
#[derive(Debug, Default)]
pub struct GossipMetrics {
    pub attestations_received: AtomicU64,
    pub attestations_rejected: AtomicU64,
    pub batches_sent: AtomicU64,
    pub batches_failed: AtomicU64,
    pub batch_items_dropped: AtomicU64,
    pub ledger_submissions: AtomicU64,
    pub ledger_failures: AtomicU64,
    pub late_sends: AtomicU64,
    pub states_pruned: AtomicU64,
    pub state_sync_facts: AtomicU64,
}

/// Point-in-time copy of [`GossipMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attestations_received: u64,
    pub attestations_rejected: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub batch_items_dropped: u64,
    pub ledger_submissions: u64,
    pub ledger_failures: u64,
    pub late_sends: u64,
    pub states_pruned: u64,
    pub state_sync_facts: u64,
}

impl GossipMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attestation_received(&self) {
        self.attestations_received.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::ATTESTATIONS_RECEIVED.inc();
    }

    pub fn record_attestation_rejected(&self, _reason: &str) {
        self.attestations_rejected.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::ATTESTATIONS_REJECTED.with_label_values(&[_reason]).inc();
    }

    pub fn record_batch_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::BATCHES_SENT.inc();
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::BATCHES_FAILED.inc();
    }

    pub fn record_batch_items_dropped(&self, count: u64) {
        self.batch_items_dropped.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::BATCH_ITEMS_DROPPED.inc_by(count);
    }

    pub fn record_ledger_submission(&self, success: bool) {
        self.ledger_submissions.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::LEDGER_SUBMISSIONS.inc();
        if !success {
            self.ledger_failures.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            prom::LEDGER_FAILURES.inc();
        }
    }

    pub fn record_late_send(&self) {
        self.late_sends.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::LATE_SENDS.inc();
    }

    pub fn record_states_pruned(&self, count: u64) {
        self.states_pruned.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::STATES_PRUNED.inc_by(count);
    }

    pub fn record_state_sync_facts(&self, count: u64) {
        self.state_sync_facts.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        prom::STATE_SYNC_FACTS.inc_by(count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attestations_received: self.attestations_received.load(Ordering::Relaxed),
            attestations_rejected: self.attestations_rejected.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            batch_items_dropped: self.batch_items_dropped.load(Ordering::Relaxed),
            ledger_submissions: self.ledger_submissions.load(Ordering::Relaxed),
            ledger_failures: self.ledger_failures.load(Ordering::Relaxed),
            late_sends: self.late_sends.load(Ordering::Relaxed),
            states_pruned: self.states_pruned.load(Ordering::Relaxed),
            state_sync_facts: self.state_sync_facts.load(Ordering::Relaxed),
        }
    }
}
