//! # Attestation Gossip Coordinator
//!
//! Owns the four category maps and wires them to the outside world:
//!
//! ```text
//!   observation layer ──attest_*──►┐
//!                                  │          ┌──► batcher ──► peers
//!   peers ──BATCH_PROTOCOL────────►├─ states ─┤
//!   peers ──STATE_PROTOCOL (dump)─►│          └──► ledger bridge (submit)
//!   ledger events ──commit────────►┘
//!                                  ▲
//!   reconcile tick ────────────────┘ prune, late re-send, runtime tuning
//! ```
//!
//! ## Locking
//!
//! Each category has a map lock and one lock per state, always taken in
//! that order. The validator set lock is never held with either: callers
//! take an `Arc<ValidatorSet>` snapshot first.

mod category;
mod handlers;
mod reconcile;
mod sync;

use k256::ecdsa::SigningKey;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventClient, EventSource};
use shared_types::{
    pub_key_of, sign_item, Attestable, AttestedFact, ErrataTx, NetworkFee, PubKey, Quorum,
    Solvency, TxObservation,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::batcher::AttestationBatcher;
use crate::config::{GossipConfig, KEYSIGN_PARTY_TTL, PEER_IDLE_TIMEOUT};
use crate::domain::{ActiveValidators, KeysignPartyCache, PeerId, PeerManager};
use crate::error::{GossipError, GossipResult};
use crate::metrics::GossipMetrics;
use crate::ports::inbound::{AttestationGossipApi, CategoryCounts};
use crate::ports::outbound::{KeyProvider, LedgerBridge, ObservationSink, PeerHost};

use category::CategoryStates;

/// Maps a fact type to its category map and category-specific hooks.
pub(crate) trait Tracked: Attestable {
    fn states(gossip: &AttestationGossip) -> &CategoryStates<Self>;

    /// Vault whose keysign party may sign this fact besides the active set.
    fn vault(&self) -> Option<&PubKey> {
        None
    }

    /// Called on commit when this node's attestation made it in.
    fn on_local_commit(_gossip: &AttestationGossip, _quorum: &Quorum<Self>) {}
}

impl Tracked for TxObservation {
    fn states(gossip: &AttestationGossip) -> &CategoryStates<Self> {
        &gossip.observed_txs
    }

    fn vault(&self) -> Option<&PubKey> {
        // Outbounds are signed by the vault's keysign party.
        (!self.inbound).then_some(&self.obs_tx.observed_pub_key)
    }

    fn on_local_commit(gossip: &AttestationGossip, quorum: &Quorum<Self>) {
        let sink = gossip.observation_sink.read().clone();
        if let Some(sink) = sink {
            sink.handle_observed_tx_committed(&quorum.item.obs_tx);
        }
    }
}

impl Tracked for NetworkFee {
    fn states(gossip: &AttestationGossip) -> &CategoryStates<Self> {
        &gossip.network_fees
    }
}

impl Tracked for Solvency {
    fn states(gossip: &AttestationGossip) -> &CategoryStates<Self> {
        &gossip.solvencies
    }
}

impl Tracked for ErrataTx {
    fn states(gossip: &AttestationGossip) -> &CategoryStates<Self> {
        &gossip.errata_txs
    }
}

/// The coordinator. Build with [`AttestationGossip::new`], run with
/// [`AttestationGossip::start`].
pub struct AttestationGossip {
    config: GossipConfig,
    host: Arc<dyn PeerHost>,
    bridge: Arc<dyn LedgerBridge>,
    event_client: Arc<dyn EventClient>,
    metrics: Arc<GossipMetrics>,
    signing_key: SigningKey,
    pub_key: PubKey,

    observed_txs: CategoryStates<TxObservation>,
    network_fees: CategoryStates<NetworkFee>,
    solvencies: CategoryStates<Solvency>,
    errata_txs: CategoryStates<ErrataTx>,

    validators: Arc<ActiveValidators>,
    keysign_parties: KeysignPartyCache,
    batcher: Arc<AttestationBatcher>,
    receives: PeerManager,
    observation_sink: RwLock<Option<Arc<dyn ObservationSink>>>,
    asked_peers: Mutex<HashSet<PeerId>>,
}

impl AttestationGossip {
    /// Load the signing key, connect to the ledger event source and register
    /// every stream and event handler.
    ///
    /// # Errors
    ///
    /// `MissingKey` if the key cannot be loaded, `LedgerConnection` if the
    /// event source is unreachable.
    pub fn new(
        host: Arc<dyn PeerHost>,
        keys: &dyn KeyProvider,
        ledger_events: &dyn EventSource,
        bridge: Arc<dyn LedgerBridge>,
        metrics: Arc<GossipMetrics>,
        config: GossipConfig,
    ) -> GossipResult<Arc<Self>> {
        let config = config.normalized();

        let signing_key = keys.signing_key().map_err(|e| match e {
            GossipError::MissingKey(_) => e,
            other => GossipError::MissingKey(other.to_string()),
        })?;
        let pub_key = pub_key_of(&signing_key);
        let event_client = ledger_events.connect()?;

        let validators = Arc::new(ActiveValidators::new());
        let batcher = Arc::new(AttestationBatcher::new(
            host.clone(),
            validators.clone(),
            metrics.clone(),
            &config,
        ));

        let gossip = Arc::new(Self {
            receives: PeerManager::new("receives", config.peer_concurrent_receives, PEER_IDLE_TIMEOUT),
            config,
            host,
            bridge,
            event_client,
            metrics,
            signing_key,
            pub_key,
            observed_txs: CategoryStates::default(),
            network_fees: CategoryStates::default(),
            solvencies: CategoryStates::default(),
            errata_txs: CategoryStates::default(),
            validators,
            keysign_parties: KeysignPartyCache::new(KEYSIGN_PARTY_TTL),
            batcher,
            observation_sink: RwLock::new(None),
            asked_peers: Mutex::new(HashSet::new()),
        });

        gossip.register_stream_handlers();
        gossip.register_event_handlers();

        info!(
            peer = %gossip.host.local_peer_id(),
            pub_key = %gossip.pub_key,
            "Attestation gossip initialised"
        );
        Ok(gossip)
    }

    /// Register the observation layer callback for committed observed txs.
    pub fn set_observation_sink(&self, sink: Arc<dyn ObservationSink>) {
        *self.observation_sink.write() = Some(sink);
    }

    #[must_use]
    pub fn pub_key(&self) -> &PubKey {
        &self.pub_key
    }

    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.host.local_peer_id()
    }

    #[must_use]
    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<GossipMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn batcher(&self) -> &Arc<AttestationBatcher> {
        &self.batcher
    }

    /// Governor for inbound streams.
    #[must_use]
    pub fn receive_manager(&self) -> &PeerManager {
        &self.receives
    }

    #[must_use]
    pub fn active_validators(&self) -> &Arc<ActiveValidators> {
        &self.validators
    }

    /// Attestations held for the fact in `fact`, if tracked.
    #[must_use]
    pub fn attestation_count(&self, fact: &AttestedFact) -> Option<usize> {
        match fact {
            AttestedFact::ObservedTx(q) => self.count_of(&q.item),
            AttestedFact::NetworkFee(q) => self.count_of(&q.item),
            AttestedFact::Solvency(q) => self.count_of(&q.item),
            AttestedFact::ErrataTx(q) => self.count_of(&q.item),
        }
    }

    /// Whether the fact in `fact` is tracked and committed.
    #[must_use]
    pub fn is_committed(&self, fact: &AttestedFact) -> bool {
        match fact {
            AttestedFact::ObservedTx(q) => self.committed(&q.item),
            AttestedFact::NetworkFee(q) => self.committed(&q.item),
            AttestedFact::Solvency(q) => self.committed(&q.item),
            AttestedFact::ErrataTx(q) => self.committed(&q.item),
        }
    }

    /// Every uncommitted fact with its known attestations.
    #[must_use]
    pub fn pending_facts(&self) -> Vec<AttestedFact> {
        let mut facts = Vec::new();
        facts.extend(self.observed_txs.snapshot_pending().into_iter().map(TxObservation::into_fact));
        facts.extend(self.network_fees.snapshot_pending().into_iter().map(NetworkFee::into_fact));
        facts.extend(self.solvencies.snapshot_pending().into_iter().map(Solvency::into_fact));
        facts.extend(self.errata_txs.snapshot_pending().into_iter().map(ErrataTx::into_fact));
        facts
    }

    fn count_of<T: Tracked>(&self, item: &T) -> Option<usize> {
        T::states(self).with_existing(&item.fact_key(), |s| s.attestation_count())
    }

    fn committed<T: Tracked>(&self, item: &T) -> bool {
        T::states(self)
            .with_existing(&item.fact_key(), |s| s.is_committed())
            .unwrap_or(false)
    }

    /// Sign `item`, record it, gossip our attestation and submit to the ledger.
    async fn attest<T: Tracked>(&self, item: T) -> GossipResult<()> {
        let attestation = sign_item(&self.signing_key, &item)?;
        let now = Instant::now();

        let submission = T::states(self).upsert(&item, now, |state| {
            if !state.add_local_attestation(attestation.clone()) {
                return None;
            }
            state.mark_sent(now);
            state.unconfirmed_quorum()
        });

        let Some(quorum) = submission else {
            debug!(category = %T::CATEGORY, "Already attested");
            return Ok(());
        };

        self.batcher
            .enqueue(T::into_fact(Quorum::new(item, vec![attestation])));
        self.submit(T::into_fact(quorum)).await;
        Ok(())
    }

    /// Submit to the ledger. Failures are logged and counted.
    async fn submit(&self, fact: AttestedFact) {
        let category = fact.category();
        let attestations = fact.attestations().len();
        match self.bridge.submit(fact).await {
            Ok(()) => {
                debug!(category = %category, attestations, "Submitted to ledger");
                self.metrics.record_ledger_submission(true);
            }
            Err(e) => {
                warn!(category = %category, error = %e, "Ledger submission failed");
                self.metrics.record_ledger_submission(false);
            }
        }
    }
}

#[async_trait::async_trait]
impl AttestationGossipApi for AttestationGossip {
    async fn attest_observed_tx(&self, observation: TxObservation) -> GossipResult<()> {
        self.attest(observation).await
    }

    async fn attest_network_fee(&self, fee: NetworkFee) -> GossipResult<()> {
        self.attest(fee).await
    }

    async fn attest_solvency(&self, solvency: Solvency) -> GossipResult<()> {
        self.attest(solvency).await
    }

    async fn attest_errata_tx(&self, errata: ErrataTx) -> GossipResult<()> {
        self.attest(errata).await
    }

    fn set_active_validators(&self, validators: &[PubKey]) {
        self.validators.set(validators);
    }

    fn tracked_counts(&self) -> CategoryCounts {
        CategoryCounts {
            observed_txs: self.observed_txs.len(),
            network_fees: self.network_fees.len(),
            solvencies: self.solvencies.len(),
            errata_txs: self.errata_txs.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::{InMemoryLedger, MemoryNetwork, StaticKeyProvider};
    use shared_bus::InMemoryEventBus;
    use shared_types::{Chain, NetworkFee};

    pub struct Node {
        pub gossip: Arc<AttestationGossip>,
        pub key: SigningKey,
    }

    pub struct Net {
        pub network: Arc<MemoryNetwork>,
        pub bus: Arc<InMemoryEventBus>,
        pub ledger: Arc<InMemoryLedger>,
    }

    impl Net {
        pub fn new(quorum: usize) -> Self {
            let bus = Arc::new(InMemoryEventBus::new());
            Self {
                network: MemoryNetwork::new(),
                ledger: Arc::new(InMemoryLedger::new(bus.clone(), quorum)),
                bus,
            }
        }

        pub fn node(&self, key: SigningKey, config: GossipConfig) -> Node {
            let peer = PeerId::from_pub_key(&pub_key_of(&key)).unwrap();
            let host = self.network.add_host(peer);
            let gossip = AttestationGossip::new(
                host,
                &StaticKeyProvider::new(key.clone()),
                self.bus.as_ref(),
                self.ledger.clone(),
                Arc::new(GossipMetrics::new()),
                config,
            )
            .unwrap();
            Node { gossip, key }
        }
    }

    pub fn random_key() -> SigningKey {
        SigningKey::random(&mut rand::thread_rng())
    }

    pub fn fee(height: u64) -> NetworkFee {
        NetworkFee {
            chain: Chain::new("btc"),
            height,
            transaction_size: 250,
            transaction_rate: 12,
        }
    }
}
