//! # Test Network Harness
//!
//! Builds N validators sharing one `MemoryNetwork`, one `InMemoryEventBus`
//! and one `InMemoryLedger`. Every validator gets its own shutdown channel
//! so a single node can be restarted without touching the others. The
//! ledger closes a block every `BLOCK_TIME` while the network is started.

use std::sync::Arc;
use std::time::Duration;

use attestation_gossip::adapters::{InMemoryLedger, MemoryHost, MemoryNetwork, StaticKeyProvider};
use attestation_gossip::{
    AttestationGossip, AttestationGossipApi, GossipConfig, GossipMetrics, ObservationSink, PeerId,
};
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use shared_types::{
    pub_key_of, sign_item, Attestable, AttestedFact, Chain, Coin, NetworkFee, ObservedTx, PubKey,
    Quorum, Tx, TxId, TxObservation,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delay that lets a freshly started node pass its startup sleep.
pub const STARTUP: Duration = Duration::from_millis(100);

/// Ledger block interval. Several batch flushes fit in one block.
pub const BLOCK_TIME: Duration = Duration::from_millis(100);

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Collects every committed observation a validator is told about.
#[derive(Default)]
pub struct RecordingSink {
    committed: Mutex<Vec<ObservedTx>>,
}

impl RecordingSink {
    pub fn committed(&self) -> Vec<ObservedTx> {
        self.committed.lock().clone()
    }
}

impl ObservationSink for RecordingSink {
    fn handle_observed_tx_committed(&self, obs_tx: &ObservedTx) {
        self.committed.lock().push(obs_tx.clone());
    }
}

/// One validator and the handles needed to stop or partition it.
pub struct Validator {
    pub key: SigningKey,
    pub gossip: Arc<AttestationGossip>,
    pub host: Arc<MemoryHost>,
    pub sink: Arc<RecordingSink>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Validator {
    pub fn pub_key(&self) -> PubKey {
        pub_key_of(&self.key)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

/// A set of validators that know about each other.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    pub bus: Arc<InMemoryEventBus>,
    pub ledger: Arc<InMemoryLedger>,
    pub validators: Vec<Validator>,
    config: GossipConfig,
    pub_keys: Vec<PubKey>,
    blocks: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl TestNetwork {
    /// `count` validators, none started. The ledger commits at `quorum`.
    pub fn new(count: usize, quorum: usize, config: GossipConfig) -> Self {
        init_tracing();
        let network = MemoryNetwork::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(InMemoryLedger::new(bus.clone(), quorum));

        let keys: Vec<SigningKey> = (0..count).map(|_| random_key()).collect();
        let pub_keys: Vec<PubKey> = keys.iter().map(pub_key_of).collect();
        ledger.set_validators(&pub_keys);

        let mut net = Self {
            network,
            bus,
            ledger,
            validators: Vec::with_capacity(count),
            config,
            pub_keys,
            blocks: None,
        };
        for key in keys {
            let validator = net.build(key);
            net.validators.push(validator);
        }
        net
    }

    /// Testing timings with a non-quorum timeout long enough for a scenario.
    pub fn default_config() -> GossipConfig {
        GossipConfig {
            non_quorum_timeout: Duration::from_secs(60),
            ..GossipConfig::for_testing()
        }
    }

    fn build(&self, key: SigningKey) -> Validator {
        let peer = PeerId::from_pub_key(&pub_key_of(&key)).unwrap();
        let host = self.network.add_host(peer);
        let gossip = AttestationGossip::new(
            host.clone(),
            &StaticKeyProvider::new(key.clone()),
            self.bus.as_ref(),
            self.ledger.clone(),
            Arc::new(GossipMetrics::new()),
            self.config.clone(),
        )
        .unwrap();
        gossip.set_active_validators(&self.pub_keys);
        let sink = Arc::new(RecordingSink::default());
        gossip.set_observation_sink(sink.clone());
        Validator {
            key,
            gossip,
            host,
            sink,
            shutdown: None,
            task: None,
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn gossip(&self, index: usize) -> &Arc<AttestationGossip> {
        &self.validators[index].gossip
    }

    /// Start one validator's background loops.
    pub fn start(&mut self, index: usize) {
        let validator = &mut self.validators[index];
        let (tx, rx) = watch::channel(false);
        validator.task = Some(tokio::spawn(validator.gossip.clone().start(rx)));
        validator.shutdown = Some(tx);
    }

    /// Start block production and every validator, then wait out the
    /// startup delay.
    pub async fn start_all(&mut self) {
        if self.blocks.is_none() {
            let (tx, rx) = watch::channel(false);
            let task = tokio::spawn(self.ledger.clone().run(BLOCK_TIME, rx));
            self.blocks = Some((tx, task));
        }
        for i in 0..self.validators.len() {
            self.start(i);
        }
        tokio::time::sleep(STARTUP).await;
    }

    /// Stop one validator and wait for its loops to exit.
    pub async fn stop(&mut self, index: usize) {
        let validator = &mut self.validators[index];
        if let Some(tx) = validator.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = validator.task.take() {
            task.await.unwrap();
        }
    }

    pub async fn stop_all(&mut self) {
        for i in 0..self.validators.len() {
            self.stop(i).await;
        }
        if let Some((tx, task)) = self.blocks.take() {
            let _ = tx.send(true);
            task.await.unwrap();
        }
    }

    /// Replace a validator with a fresh process holding the same key.
    /// The new node starts with empty state and runs its startup catch-up.
    pub async fn restart(&mut self, index: usize) {
        self.stop(index).await;
        let key = self.validators[index].key.clone();
        self.validators[index] = self.build(key);
        self.start(index);
    }

    /// Take a validator off the mesh, or bring it back.
    pub fn set_online(&self, index: usize, online: bool) {
        self.validators[index].host.set_online(online);
    }
}

/// Poll `condition` every 10 ms for up to `limit`.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn random_key() -> SigningKey {
    SigningKey::random(&mut rand::thread_rng())
}

pub fn fee(chain: &str, height: u64) -> NetworkFee {
    NetworkFee {
        chain: Chain::new(chain),
        height,
        transaction_size: 250,
        transaction_rate: 25,
    }
}

/// Lookup key for a fact regardless of who attested it.
pub fn fact_of<T: Attestable>(item: &T) -> AttestedFact {
    T::into_fact(Quorum::new(item.clone(), vec![]))
}

/// `item` signed by the validators at `signers`.
pub fn signed_by<T: Attestable>(net: &TestNetwork, signers: &[usize], item: &T) -> AttestedFact {
    let attestations = signers
        .iter()
        .map(|&i| sign_item(&net.validators[i].key, item).unwrap())
        .collect();
    T::into_fact(Quorum::new(item.clone(), attestations))
}

pub fn observed_tx(id: u64, vault: PubKey) -> ObservedTx {
    ObservedTx {
        tx: Tx {
            id: TxId(format!("{id:064X}")),
            chain: Chain::new("ETH"),
            from_address: "0xsender".to_string(),
            to_address: "0xvault".to_string(),
            coins: vec![Coin::new("ETH.ETH", 50_000 + id)],
            gas: vec![Coin::new("ETH.ETH", 21)],
            memo: format!("OUT:{id}"),
        },
        block_height: 1_000 + id,
        finalise_height: 1_000 + id,
        observed_pub_key: vault,
        keysign_ms: 0,
    }
}

pub fn inbound(id: u64, vault: PubKey) -> TxObservation {
    TxObservation::inbound(observed_tx(id, vault))
}

pub fn outbound(id: u64, vault: PubKey) -> TxObservation {
    TxObservation::outbound(observed_tx(id, vault))
}

/// Attest the same fee on every validator in the given order.
pub async fn attest_fee_in_order(net: &TestNetwork, order: &[usize], item: &NetworkFee) {
    for &i in order {
        net.gossip(i).attest_network_fee(item.clone()).await.unwrap();
    }
}
