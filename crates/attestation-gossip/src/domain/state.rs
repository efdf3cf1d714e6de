//! # Attestation State
//!
//! Tracks one candidate fact and the attestations collected for it.
//!
//! ## Lifecycle
//!
//! ```text
//! unseen ──► pending ──► committed ──► pooled
//!               │                        ▲
//!               └──── non-quorum timeout ┘
//! ```
//!
//! All time-dependent methods take `now` explicitly so callers decide the
//! clock (the service uses `tokio::time::Instant`, which tests can pause).
//!
//! The state itself holds no lock. The service wraps each instance in its own
//! mutex, always acquired while holding the category map lock, and the map
//! lock is released before any work is done under the instance lock.

use shared_types::{Attestable, Attestation, PubKey, Quorum};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on idle instances kept per pool.
pub const MAX_POOLED_STATES: usize = 1024;

/// One candidate fact and its attestations.
#[derive(Debug)]
pub struct AttestationState<T: Attestable> {
    /// `None` only while the instance sits in a pool.
    item: Option<T>,
    attestations: HashMap<PubKey, Vec<u8>>,
    /// Signers included in the ledger's commit.
    committed_signers: HashSet<PubKey>,
    local_attested: bool,
    first_seen: Instant,
    last_sent: Option<Instant>,
    committed_at: Option<Instant>,
}

impl<T: Attestable> AttestationState<T> {
    #[must_use]
    pub fn new(item: T, now: Instant) -> Self {
        Self {
            item: Some(item),
            attestations: HashMap::new(),
            committed_signers: HashSet::new(),
            local_attested: false,
            first_seen: now,
            last_sent: None,
            committed_at: None,
        }
    }

    #[must_use]
    pub fn item(&self) -> Option<&T> {
        self.item.as_ref()
    }

    /// Insert a peer attestation. Returns `true` if the set changed.
    pub fn add_attestation(&mut self, attestation: Attestation) -> bool {
        if self.attestations.contains_key(&attestation.pub_key) {
            return false;
        }
        self.attestations
            .insert(attestation.pub_key, attestation.signature);
        true
    }

    /// Insert this validator's own attestation.
    pub fn add_local_attestation(&mut self, attestation: Attestation) -> bool {
        self.local_attested = true;
        self.add_attestation(attestation)
    }

    /// Record the ledger commit. Only the first call has any effect.
    pub fn mark_attestations_committed(&mut self, proofs: &[Attestation], now: Instant) {
        if self.committed_at.is_some() {
            return;
        }
        self.committed_at = Some(now);
        self.committed_signers
            .extend(proofs.iter().map(|a| a.pub_key.clone()));
    }

    /// Whether the state should be deleted and pooled.
    ///
    /// Committed states expire once the late-observe window has passed since
    /// commit; uncommitted ones once `non_quorum_timeout` has passed since
    /// they were first seen.
    #[must_use]
    pub fn expired_after_quorum(
        &self,
        late_observe_timeout: Duration,
        non_quorum_timeout: Duration,
        now: Instant,
    ) -> bool {
        match self.committed_at {
            Some(committed) => now.saturating_duration_since(committed) > late_observe_timeout,
            None => now.saturating_duration_since(self.first_seen) > non_quorum_timeout,
        }
    }

    /// Whether the reconcile loop should re-submit to the ledger.
    #[must_use]
    pub fn should_send_late(&self, min_interval: Duration, now: Instant) -> bool {
        self.committed_at.is_none() && self.local_attested && self.send_allowed(min_interval, now)
    }

    /// Whether `min_interval` has passed since the last submission.
    #[must_use]
    pub fn send_allowed(&self, min_interval: Duration, now: Instant) -> bool {
        self.last_sent
            .map_or(true, |sent| now.saturating_duration_since(sent) >= min_interval)
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Every known attestation, as a ledger submission.
    #[must_use]
    pub fn quorum(&self) -> Option<Quorum<T>> {
        let item = self.item.clone()?;
        let attestations = self
            .attestations
            .iter()
            .map(|(pub_key, signature)| Attestation {
                pub_key: pub_key.clone(),
                signature: signature.clone(),
            })
            .collect();
        Some(Quorum::new(item, attestations))
    }

    /// Attestations the ledger has not yet acknowledged in a commit.
    ///
    /// Before commit this is every attestation. Returns `None` when there is
    /// nothing new to submit.
    #[must_use]
    pub fn unconfirmed_quorum(&self) -> Option<Quorum<T>> {
        let item = self.item.clone()?;
        let attestations: Vec<Attestation> = self
            .attestations
            .iter()
            .filter(|(pub_key, _)| !self.committed_signers.contains(*pub_key))
            .map(|(pub_key, signature)| Attestation {
                pub_key: pub_key.clone(),
                signature: signature.clone(),
            })
            .collect();
        if attestations.is_empty() {
            return None;
        }
        Some(Quorum::new(item, attestations))
    }

    #[must_use]
    pub fn has_attestation(&self, pub_key: &PubKey) -> bool {
        self.attestations.contains_key(pub_key)
    }

    #[must_use]
    pub fn attestation_count(&self) -> usize {
        self.attestations.len()
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed_at.is_some()
    }

    #[must_use]
    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    #[must_use]
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    #[must_use]
    pub fn committed_at(&self) -> Option<Instant> {
        self.committed_at
    }

    /// Clear every field. Keeps map capacity for reuse.
    pub fn reset(&mut self, now: Instant) {
        self.item = None;
        self.attestations.clear();
        self.committed_signers.clear();
        self.local_attested = false;
        self.first_seen = now;
        self.last_sent = None;
        self.committed_at = None;
    }

    fn reinit(&mut self, item: T, now: Instant) {
        self.item = Some(item);
        self.first_seen = now;
    }
}

/// Free-list of reset states for one category.
#[derive(Debug)]
pub struct AttestationStatePool<T: Attestable> {
    free: Vec<AttestationState<T>>,
    capacity: usize,
}

impl<T: Attestable> Default for AttestationStatePool<T> {
    fn default() -> Self {
        Self::with_capacity(MAX_POOLED_STATES)
    }
}

impl<T: Attestable> AttestationStatePool<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            capacity,
        }
    }

    /// Take a pooled instance, or allocate one.
    pub fn get(&mut self, item: T, now: Instant) -> AttestationState<T> {
        match self.free.pop() {
            Some(mut state) => {
                state.reinit(item, now);
                state
            }
            None => AttestationState::new(item, now),
        }
    }

    /// Reset `state` and keep it for reuse. Dropped when the pool is full.
    pub fn put(&mut self, mut state: AttestationState<T>, now: Instant) {
        if self.free.len() >= self.capacity {
            return;
        }
        state.reset(now);
        self.free.push(state);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}
