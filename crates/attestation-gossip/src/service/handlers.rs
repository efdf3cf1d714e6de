//! Inbound paths: ledger commit events, batched attestations from peers and
//! state dump requests. Every error here is logged, counted and contained.

use shared_bus::{LedgerEvent, LedgerEventKind};
use shared_types::{
    verify_attestation, Attestable, AttestedFact, ErrataTx, NetworkFee, PubKey, Quorum, Solvency,
    TxObservation,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::{AttestationGossip, Tracked};
use crate::domain::{PeerId, ValidatorSet};
use crate::error::{GossipError, GossipResult};
use crate::ports::outbound::{stream_handler, PeerStream};
use crate::wire::{read_batch, serve_state, BATCH_PROTOCOL, STATE_PROTOCOL};

impl AttestationGossip {
    pub(super) fn register_stream_handlers(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.host.set_stream_handler(
            BATCH_PROTOCOL,
            stream_handler(move |peer, stream| {
                let weak = weak.clone();
                async move {
                    if let Some(gossip) = weak.upgrade() {
                        gossip.handle_batch_stream(peer, stream).await;
                    }
                }
            }),
        );

        let weak = Arc::downgrade(self);
        self.host.set_stream_handler(
            STATE_PROTOCOL,
            stream_handler(move |peer, stream| {
                let weak = weak.clone();
                async move {
                    if let Some(gossip) = weak.upgrade() {
                        gossip.handle_state_stream(peer, stream).await;
                    }
                }
            }),
        );
    }

    pub(super) fn register_event_handlers(self: &Arc<Self>) {
        self.register_commit_handler::<TxObservation>();
        self.register_commit_handler::<NetworkFee>();
        self.register_commit_handler::<Solvency>();
        self.register_commit_handler::<ErrataTx>();
    }

    fn register_commit_handler<T: Tracked>(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.event_client.register_handler(
            LedgerEventKind::for_category(T::CATEGORY),
            Arc::new(move |event: &LedgerEvent| {
                if let Some(gossip) = weak.upgrade() {
                    gossip.handle_committed::<T>(event);
                }
            }),
        );
    }

    /// Mark the matching state committed. A commit for a fact not yet
    /// tracked is held so gossip arriving afterwards does not reopen it.
    fn handle_committed<T: Tracked>(&self, event: &LedgerEvent) {
        let quorum: Quorum<T> = match event.decode() {
            Ok(quorum) => quorum,
            Err(e) => {
                warn!(kind = ?event.kind, error = %e, "Undecodable commit event");
                self.metrics.record_attestation_rejected("decode");
                return;
            }
        };

        if quorum.attested_by(&self.pub_key) {
            T::on_local_commit(self, &quorum);
        }

        let now = Instant::now();
        if T::states(self).commit(&quorum.item.fact_key(), &quorum.attestations, now) {
            debug!(
                category = %T::CATEGORY,
                height = event.height,
                signers = quorum.attestations.len(),
                "Fact committed"
            );
        } else {
            trace!(category = %T::CATEGORY, height = event.height, "Commit ahead of gossip");
        }
    }

    async fn handle_batch_stream(&self, peer: PeerId, mut stream: PeerStream) {
        if !self.validators.snapshot().contains_peer(&peer) {
            debug!(peer = %peer, "Batch from non-validator peer dropped");
            return;
        }
        let _permit = match self.receives.acquire(peer, self.config.peer_timeout).await {
            Ok(permit) => permit,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Inbound batch refused");
                return;
            }
        };

        let facts = match read_batch(&mut stream, self.config.peer_timeout).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to read attestation batch");
                return;
            }
        };
        trace!(peer = %peer, facts = facts.len(), "Attestation batch received");
        for fact in facts {
            self.ingest_fact(fact).await;
        }
    }

    async fn handle_state_stream(&self, peer: PeerId, mut stream: PeerStream) {
        if !self.validators.snapshot().contains_peer(&peer) {
            debug!(peer = %peer, "State request from non-validator peer dropped");
            return;
        }
        let _permit = match self.receives.acquire(peer, self.config.peer_timeout).await {
            Ok(permit) => permit,
            Err(e) => {
                debug!(peer = %peer, error = %e, "State request refused");
                return;
            }
        };

        let facts = self.pending_facts();
        match serve_state(&mut stream, &facts, self.config.peer_timeout).await {
            Ok(batches) => debug!(peer = %peer, facts = facts.len(), batches, "Served state"),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to serve state"),
        }
    }

    pub(super) async fn ingest_fact(&self, fact: AttestedFact) {
        match fact {
            AttestedFact::ObservedTx(quorum) => self.ingest(quorum).await,
            AttestedFact::NetworkFee(quorum) => self.ingest(quorum).await,
            AttestedFact::Solvency(quorum) => self.ingest(quorum).await,
            AttestedFact::ErrataTx(quorum) => self.ingest(quorum).await,
        }
    }

    /// Verify peer attestations, merge them in and forward to the ledger if
    /// anything changed and the send interval allows.
    async fn ingest<T: Tracked>(&self, quorum: Quorum<T>) {
        let now = Instant::now();
        let validators = self.validators.snapshot();
        let Quorum { item, attestations } = quorum;

        let mut accepted = Vec::with_capacity(attestations.len());
        for attestation in attestations {
            // Our own attestation is authoritative locally.
            if attestation.pub_key == self.pub_key {
                continue;
            }
            if let Err(e) = self
                .check_signer(&item, &attestation.pub_key, &validators, now)
                .await
            {
                debug!(category = %T::CATEGORY, error = %e, "Attestation rejected");
                self.metrics.record_attestation_rejected("unknown_signer");
                continue;
            }
            if let Err(e) = verify_attestation(&item, &attestation) {
                debug!(category = %T::CATEGORY, signer = %attestation.pub_key, error = %e, "Attestation rejected");
                self.metrics.record_attestation_rejected("bad_signature");
                continue;
            }
            accepted.push(attestation);
        }
        if accepted.is_empty() {
            return;
        }

        let min_interval = self.config.min_time_between_attestations;
        let metrics = &self.metrics;
        let forward = T::states(self).upsert(&item, now, |state| {
            let mut changed = false;
            for attestation in accepted {
                if state.add_attestation(attestation) {
                    metrics.record_attestation_received();
                    changed = true;
                }
            }
            if changed && state.send_allowed(min_interval, now) {
                state.mark_sent(now);
                state.unconfirmed_quorum()
            } else {
                None
            }
        });

        if let Some(quorum) = forward {
            self.submit(T::into_fact(quorum)).await;
        }
    }

    /// The signer must be an active validator, or for facts tied to a vault,
    /// a member of that vault's keysign party.
    async fn check_signer<T: Tracked>(
        &self,
        item: &T,
        signer: &PubKey,
        validators: &ValidatorSet,
        now: Instant,
    ) -> GossipResult<()> {
        if validators.contains_key(signer) {
            return Ok(());
        }
        if let Some(vault) = item.vault() {
            let members = match self.keysign_parties.get(vault, now) {
                Some(members) => members,
                None => {
                    // A failed lookup is cached as an empty party for the same TTL.
                    let members = match self.bridge.get_keysign_party(vault).await {
                        Ok(members) => members,
                        Err(e) => {
                            debug!(vault = %vault, error = %e, "Keysign party lookup failed");
                            Vec::new()
                        }
                    };
                    self.keysign_parties.insert(vault.clone(), members.clone(), now);
                    members
                }
            };
            if members.contains(signer) {
                return Ok(());
            }
        }
        Err(GossipError::UnknownValidator(signer.to_string()))
    }
}
