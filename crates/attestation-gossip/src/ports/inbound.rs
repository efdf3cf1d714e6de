//! Inbound ports (API) for attestation gossip.

use async_trait::async_trait;
use shared_types::{ErrataTx, NetworkFee, PubKey, Solvency, TxObservation};

use crate::error::GossipResult;

/// Number of tracked candidates per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub observed_txs: usize,
    pub network_fees: usize,
    pub solvencies: usize,
    pub errata_txs: usize,
}

impl CategoryCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.observed_txs + self.network_fees + self.solvencies + self.errata_txs
    }
}

/// Primary API used by the observation layer.
///
/// Each `attest_*` call signs the fact with the local key, records the
/// attestation, queues it for gossip to the active validators and submits
/// it to the ledger. Repeating a call for the same fact is a no-op.
#[async_trait]
pub trait AttestationGossipApi: Send + Sync {
    async fn attest_observed_tx(&self, observation: TxObservation) -> GossipResult<()>;

    async fn attest_network_fee(&self, fee: NetworkFee) -> GossipResult<()>;

    async fn attest_solvency(&self, solvency: Solvency) -> GossipResult<()>;

    async fn attest_errata_tx(&self, errata: ErrataTx) -> GossipResult<()>;

    /// Replace the active validator set after churn.
    fn set_active_validators(&self, validators: &[PubKey]);

    fn tracked_counts(&self) -> CategoryCounts;
}
