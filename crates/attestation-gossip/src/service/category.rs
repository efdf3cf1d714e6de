//! Per-category state map.
//!
//! Lock order is always map lock, then state lock. The state lock is taken
//! with `lock_arc` while the map lock is held, and the map lock is released
//! before the caller's closure runs, so long work on one state never blocks
//! lookups of another.
//!
//! A commit can arrive before any gossip for its fact. It is held for the
//! late-observe window and applied when the state is first created.

use parking_lot::Mutex;
use shared_types::{Attestable, Attestation, Quorum};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::{AttestationState, AttestationStatePool};

type SharedState<T> = Arc<Mutex<AttestationState<T>>>;

struct EarlyCommit {
    proofs: Vec<Attestation>,
    at: Instant,
}

struct Inner<T: Attestable> {
    states: HashMap<T::Key, SharedState<T>>,
    pool: AttestationStatePool<T>,
    early_commits: HashMap<T::Key, EarlyCommit>,
}

/// Outcome of one reconcile pass over a category.
pub(crate) struct Reconciled<T> {
    pub late_sends: Vec<Quorum<T>>,
    pub pruned: usize,
}

pub(crate) struct CategoryStates<T: Attestable> {
    inner: Mutex<Inner<T>>,
}

impl<T: Attestable> Default for CategoryStates<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                states: HashMap::new(),
                pool: AttestationStatePool::default(),
                early_commits: HashMap::new(),
            }),
        }
    }
}

impl<T: Attestable> CategoryStates<T> {
    /// Run `f` on the state for `item`, creating it from the pool if absent.
    pub fn upsert<R>(&self, item: &T, now: Instant, f: impl FnOnce(&mut AttestationState<T>) -> R) -> R {
        let mut state = {
            let mut inner = self.inner.lock();
            let Inner {
                states,
                pool,
                early_commits,
            } = &mut *inner;
            let shared = match states.entry(item.fact_key()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let mut state = pool.get(item.clone(), now);
                    if let Some(early) = early_commits.remove(entry.key()) {
                        state.mark_attestations_committed(&early.proofs, early.at);
                    }
                    entry.insert(Arc::new(Mutex::new(state)))
                }
            };
            let guard = shared.lock_arc();
            guard
        };
        f(&mut state)
    }

    /// Run `f` on the state for `key` if it is tracked.
    pub fn with_existing<R>(&self, key: &T::Key, f: impl FnOnce(&mut AttestationState<T>) -> R) -> Option<R> {
        let mut state = {
            let inner = self.inner.lock();
            let guard = inner.states.get(key)?.lock_arc();
            guard
        };
        Some(f(&mut state))
    }

    /// Mark the state for `key` committed with `proofs`.
    ///
    /// Returns false when the fact is not tracked yet; the commit is then
    /// held and applied by the `upsert` that creates the state.
    pub fn commit(&self, key: &T::Key, proofs: &[Attestation], now: Instant) -> bool {
        let mut state = {
            let mut inner = self.inner.lock();
            let Inner {
                states,
                early_commits,
                ..
            } = &mut *inner;
            match states.get(key) {
                Some(shared) => {
                    let guard = shared.lock_arc();
                    guard
                }
                None => {
                    early_commits.entry(key.clone()).or_insert_with(|| EarlyCommit {
                        proofs: proofs.to_vec(),
                        at: now,
                    });
                    return false;
                }
            }
        };
        state.mark_attestations_committed(proofs, now);
        true
    }

    /// Prune expired states and collect late re-sends.
    ///
    /// Expired states are pooled unless another task still holds them, in
    /// which case they are simply dropped from the map.
    pub fn reconcile(
        &self,
        now: Instant,
        late_observe_timeout: Duration,
        non_quorum_timeout: Duration,
        min_interval: Duration,
    ) -> Reconciled<T> {
        let mut inner = self.inner.lock();
        let mut expired = Vec::new();
        let mut late_sends = Vec::new();

        for (key, shared) in &inner.states {
            let mut state = shared.lock();
            if state.expired_after_quorum(late_observe_timeout, non_quorum_timeout, now) {
                expired.push(key.clone());
            } else if state.should_send_late(min_interval, now) {
                if let Some(quorum) = state.quorum() {
                    state.mark_sent(now);
                    late_sends.push(quorum);
                }
            }
        }

        let Inner {
            states,
            pool,
            early_commits,
        } = &mut *inner;
        early_commits.retain(|_, early| now.saturating_duration_since(early.at) <= late_observe_timeout);
        for key in &expired {
            if let Some(shared) = states.remove(key) {
                if let Ok(state) = Arc::try_unwrap(shared) {
                    pool.put(state.into_inner(), now);
                }
            }
        }

        Reconciled {
            late_sends,
            pruned: expired.len(),
        }
    }

    /// Every uncommitted state with at least one attestation.
    pub fn snapshot_pending(&self) -> Vec<Quorum<T>> {
        let inner = self.inner.lock();
        inner
            .states
            .values()
            .filter_map(|shared| {
                let state = shared.lock();
                if state.is_committed() {
                    None
                } else {
                    state.quorum().filter(|q| !q.attestations.is_empty())
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().states.len()
    }

    pub fn pooled(&self) -> usize {
        self.inner.lock().pool.len()
    }

    /// Commits held for facts not yet tracked.
    pub fn early_commits(&self) -> usize {
        self.inner.lock().early_commits.len()
    }
}
