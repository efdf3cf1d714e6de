//! In-memory ledger.
//!
//! Merges submitted attestations per fact. Facts are committed at the end of
//! a block, not on submission: every fact at the quorum threshold when the
//! block ends is committed and a commit event carrying the merged
//! attestations is published on the event bus, the same way a real ledger
//! would notify its local validators.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventPublisher, InMemoryEventBus, LedgerEvent};
use shared_types::{Attestation, AttestedFact, FactCategory, PubKey};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{GossipError, GossipResult};
use crate::ports::outbound::LedgerBridge;

type FactId = (FactCategory, Vec<u8>);

struct Tally {
    fact: AttestedFact,
    signers: HashMap<PubKey, Attestation>,
    committed: bool,
}

/// Ledger stand-in with a fixed quorum threshold.
pub struct InMemoryLedger {
    bus: Arc<InMemoryEventBus>,
    quorum: usize,
    height: AtomicU64,
    tallies: Mutex<HashMap<FactId, Tally>>,
    submissions: Mutex<Vec<AttestedFact>>,
    parameters: RwLock<HashMap<String, i64>>,
    keysign_parties: RwLock<HashMap<PubKey, Vec<PubKey>>>,
    keysign_lookups: AtomicU64,
    /// Signers allowed to count toward quorum. Empty means anyone.
    validators: RwLock<HashSet<PubKey>>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>, quorum: usize) -> Self {
        Self {
            bus,
            quorum: quorum.max(1),
            height: AtomicU64::new(1),
            tallies: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            parameters: RwLock::new(HashMap::new()),
            keysign_parties: RwLock::new(HashMap::new()),
            keysign_lookups: AtomicU64::new(0),
            validators: RwLock::new(HashSet::new()),
        }
    }

    pub fn set_validators(&self, validators: &[PubKey]) {
        *self.validators.write() = validators.iter().cloned().collect();
    }

    pub fn set_parameter(&self, name: &str, value: i64) {
        self.parameters.write().insert(name.to_string(), value);
    }

    pub fn set_keysign_party(&self, vault: PubKey, members: Vec<PubKey>) {
        self.keysign_parties.write().insert(vault, members);
    }

    /// Every submission received, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<AttestedFact> {
        self.submissions.lock().clone()
    }

    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Keysign party queries answered, found or not.
    #[must_use]
    pub fn keysign_lookup_count(&self) -> u64 {
        self.keysign_lookups.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.tallies.lock().values().filter(|t| t.committed).count()
    }

    /// Distinct signers recorded for `fact`.
    #[must_use]
    pub fn signer_count(&self, fact: &AttestedFact) -> usize {
        let Ok(id) = fact_id(fact) else {
            return 0;
        };
        self.tallies.lock().get(&id).map_or(0, |t| t.signers.len())
    }

    #[must_use]
    pub fn is_committed(&self, fact: &AttestedFact) -> bool {
        let Ok(id) = fact_id(fact) else {
            return false;
        };
        self.tallies.lock().get(&id).is_some_and(|t| t.committed)
    }

    /// Close the current block. Commits every fact at quorum and publishes
    /// one event per commit. Returns the number of facts committed.
    ///
    /// # Errors
    ///
    /// `Ledger` if a commit event cannot be encoded.
    pub async fn end_block(&self) -> GossipResult<usize> {
        let committed: Vec<AttestedFact> = {
            let mut tallies = self.tallies.lock();
            tallies
                .values_mut()
                .filter(|tally| !tally.committed && tally.signers.len() >= self.quorum)
                .map(|tally| {
                    tally.committed = true;
                    with_attestations(&tally.fact, tally.signers.values().cloned().collect())
                })
                .collect()
        };
        let height = self.height.fetch_add(1, Ordering::SeqCst);

        for quorum_fact in &committed {
            let event = LedgerEvent::committed(quorum_fact, height)
                .map_err(|e| GossipError::Ledger(e.to_string()))?;
            info!(category = %quorum_fact.category(), height, "Fact committed");
            self.bus.publish(event).await;
        }
        Ok(committed.len())
    }

    /// Produce a block every `block_time` until shutdown.
    pub async fn run(self: Arc<Self>, block_time: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(block_time);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.end_block().await {
                        warn!(error = %e, "Block production failed");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Ledger stopping");
                    break;
                }
            }
        }
    }

    /// Height of the next block.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn counts_toward_quorum(&self, pub_key: &PubKey) -> bool {
        let validators = self.validators.read();
        validators.is_empty() || validators.contains(pub_key)
    }
}

fn fact_id(fact: &AttestedFact) -> GossipResult<FactId> {
    let bytes = match fact {
        AttestedFact::ObservedTx(q) => bincode::serialize(&q.item),
        AttestedFact::NetworkFee(q) => bincode::serialize(&q.item),
        AttestedFact::Solvency(q) => bincode::serialize(&q.item),
        AttestedFact::ErrataTx(q) => bincode::serialize(&q.item),
    }?;
    Ok((fact.category(), bytes))
}

fn with_attestations(fact: &AttestedFact, attestations: Vec<Attestation>) -> AttestedFact {
    match fact {
        AttestedFact::ObservedTx(q) => {
            AttestedFact::ObservedTx(shared_types::Quorum::new(q.item.clone(), attestations))
        }
        AttestedFact::NetworkFee(q) => {
            AttestedFact::NetworkFee(shared_types::Quorum::new(q.item.clone(), attestations))
        }
        AttestedFact::Solvency(q) => {
            AttestedFact::Solvency(shared_types::Quorum::new(q.item.clone(), attestations))
        }
        AttestedFact::ErrataTx(q) => {
            AttestedFact::ErrataTx(shared_types::Quorum::new(q.item.clone(), attestations))
        }
    }
}

#[async_trait]
impl LedgerBridge for InMemoryLedger {
    async fn submit(&self, fact: AttestedFact) -> GossipResult<()> {
        let id = fact_id(&fact)?;
        self.submissions.lock().push(fact.clone());

        let mut tallies = self.tallies.lock();
        let tally = tallies.entry(id).or_insert_with(|| Tally {
            fact: fact.clone(),
            signers: HashMap::new(),
            committed: false,
        });
        for attestation in fact.attestations() {
            if self.counts_toward_quorum(&attestation.pub_key) {
                tally
                    .signers
                    .entry(attestation.pub_key.clone())
                    .or_insert_with(|| attestation.clone());
            }
        }
        debug!(
            category = %fact.category(),
            signers = tally.signers.len(),
            "Attestations recorded"
        );
        Ok(())
    }

    async fn get_keysign_party(&self, vault: &PubKey) -> GossipResult<Vec<PubKey>> {
        self.keysign_lookups.fetch_add(1, Ordering::Relaxed);
        self.keysign_parties
            .read()
            .get(vault)
            .cloned()
            .ok_or_else(|| GossipError::Ledger(format!("no keysign party for {vault}")))
    }

    async fn get_network_parameter(&self, name: &str) -> GossipResult<i64> {
        let value = self.parameters.read().get(name).copied().unwrap_or(0);
        if value < 0 {
            warn!(name, value, "Negative network parameter");
        }
        Ok(value)
    }
}
