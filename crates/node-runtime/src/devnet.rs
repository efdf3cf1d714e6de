//! # In-Process Devnet
//!
//! N validators, each with its own `AttestationGossip`, connected over the
//! in-memory mesh and sharing one simulated ledger.
//!
//! ```text
//!   observer tick ──► attest_network_fee / attest_observed_tx (every validator)
//!                          │
//!            ┌─────────────┼─────────────┐
//!        validator 0   validator 1 ... validator N-1
//!            └──── MemoryNetwork (batches, state sync) ────┘
//!                          │ submit
//!                    InMemoryLedger ──commit per block──► InMemoryEventBus
//! ```

use attestation_gossip::adapters::{InMemoryLedger, MemoryNetwork, StaticKeyProvider};
use attestation_gossip::{
    AttestationGossip, AttestationGossipApi, GossipMetrics, GossipResult, ObservationSink, PeerId,
};
use k256::ecdsa::SigningKey;
use rand::Rng;
use shared_bus::InMemoryEventBus;
use shared_types::{
    pub_key_of, Chain, Coin, NetworkFee, ObservedTx, PubKey, Tx, TxId, TxObservation,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;

/// Observation layer stand-in: counts committed observations.
#[derive(Default)]
pub struct CommitCounter {
    committed: AtomicU64,
}

impl CommitCounter {
    #[must_use]
    pub fn count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }
}

impl ObservationSink for CommitCounter {
    fn handle_observed_tx_committed(&self, obs_tx: &ObservedTx) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        debug!(tx = %obs_tx.tx.id, chain = %obs_tx.tx.chain, "Observation committed");
    }
}

/// One simulated validator.
pub struct DevnetValidator {
    pub gossip: Arc<AttestationGossip>,
    pub sink: Arc<CommitCounter>,
}

/// A running set of validators.
pub struct Devnet {
    config: NodeConfig,
    network: Arc<MemoryNetwork>,
    ledger: Arc<InMemoryLedger>,
    validators: Vec<DevnetValidator>,
    vault: PubKey,
    round: AtomicU64,
}

impl Devnet {
    /// Build every validator and publish the shared validator set.
    ///
    /// # Errors
    ///
    /// Fails if any validator cannot be constructed.
    pub fn new(config: NodeConfig) -> GossipResult<Self> {
        let network = MemoryNetwork::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(InMemoryLedger::new(bus.clone(), config.node.quorum));

        let keys: Vec<SigningKey> = (0..config.node.validators)
            .map(|_| SigningKey::random(&mut rand::thread_rng()))
            .collect();
        let pub_keys: Vec<PubKey> = keys.iter().map(pub_key_of).collect();
        ledger.set_validators(&pub_keys);

        let mut validators = Vec::with_capacity(keys.len());
        for key in keys {
            let peer = PeerId::from_pub_key(&pub_key_of(&key))?;
            let host = network.add_host(peer);
            let gossip = AttestationGossip::new(
                host,
                &StaticKeyProvider::new(key),
                bus.as_ref(),
                ledger.clone(),
                Arc::new(GossipMetrics::new()),
                config.attestation_gossip.clone(),
            )?;
            gossip.set_active_validators(&pub_keys);
            let sink = Arc::new(CommitCounter::default());
            gossip.set_observation_sink(sink.clone());
            validators.push(DevnetValidator { gossip, sink });
        }

        let vault = pub_key_of(&SigningKey::random(&mut rand::thread_rng()));
        info!(
            validators = validators.len(),
            quorum = config.node.quorum,
            "Devnet created"
        );
        Ok(Self {
            config,
            network,
            ledger,
            validators,
            vault,
            round: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    #[must_use]
    pub fn validators(&self) -> &[DevnetValidator] {
        &self.validators
    }

    /// Start every validator and the ledger's block producer, then drive
    /// observations until `shutdown`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tasks: Vec<JoinHandle<()>> = self
            .validators
            .iter()
            .map(|v| tokio::spawn(v.gossip.clone().start(shutdown.clone())))
            .collect();
        tasks.push(tokio::spawn(
            self.ledger
                .clone()
                .run(self.config.node.block_time(), shutdown.clone()),
        ));

        let mut ticker = tokio::time::interval(self.config.node.observation_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Let the gossip layers finish startup before the first report.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.observe_round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Devnet task failed");
            }
        }
        info!(
            committed = self.ledger.committed_count(),
            submissions = self.ledger.submission_count(),
            "Devnet stopped"
        );
    }

    /// Every validator reports the same fees and one inbound transaction.
    pub async fn observe_round(&self) {
        let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        let rate = rand::thread_rng().gen_range(5..50);
        let fees: Vec<NetworkFee> = self
            .config
            .node
            .chains
            .iter()
            .map(|chain| NetworkFee {
                chain: Chain::new(chain),
                height: round,
                transaction_size: 250,
                transaction_rate: rate,
            })
            .collect();
        let observation = self.inbound_observation(round);

        for validator in &self.validators {
            for fee in &fees {
                if let Err(e) = validator.gossip.attest_network_fee(fee.clone()).await {
                    warn!(error = %e, "Fee attestation failed");
                }
            }
            if let Err(e) = validator
                .gossip
                .attest_observed_tx(observation.clone())
                .await
            {
                warn!(error = %e, "Observation attestation failed");
            }
        }

        info!(
            round,
            committed = self.ledger.committed_count(),
            "Observation round complete"
        );
    }

    fn inbound_observation(&self, round: u64) -> TxObservation {
        let chain = self
            .config
            .node
            .chains
            .first()
            .map_or_else(|| Chain::new("BTC"), |c| Chain::new(c));
        TxObservation::inbound(ObservedTx {
            tx: Tx {
                id: TxId(format!("{round:064X}")),
                chain: chain.clone(),
                from_address: "sender".to_string(),
                to_address: "vault".to_string(),
                coins: vec![Coin::new(&format!("{}.{}", chain, chain), 100_000 * round)],
                gas: vec![],
                memo: format!("ADD:{chain}.{chain}"),
            },
            block_height: round,
            finalise_height: round,
            observed_pub_key: self.vault.clone(),
            keysign_ms: 0,
        })
    }
}
