//! Startup catch-up: ask a few random peers for their pending state.

use futures::future::join_all;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::AttestationGossip;
use crate::domain::PeerId;
use crate::error::GossipResult;
use crate::wire::{request_state, STATE_PROTOCOL};

impl AttestationGossip {
    /// Request state from up to `ask_peers` connected peers not asked before.
    /// Returns the number of facts received.
    pub async fn ask_peers(&self) -> usize {
        let local = self.host.local_peer_id();
        let chosen: Vec<PeerId> = {
            let mut asked = self.asked_peers.lock();
            let candidates: Vec<PeerId> = self
                .host
                .connected_peers()
                .into_iter()
                .filter(|peer| *peer != local && !asked.contains(peer))
                .collect();
            let chosen: Vec<PeerId> = candidates
                .choose_multiple(&mut rand::thread_rng(), self.config.ask_peers)
                .copied()
                .collect();
            asked.extend(chosen.iter().copied());
            chosen
        };

        if chosen.is_empty() {
            debug!("No peers to ask for state");
            return 0;
        }

        let received: usize = join_all(chosen.iter().map(|peer| self.catch_up_from(*peer)))
            .await
            .into_iter()
            .sum();
        info!(peers = chosen.len(), facts = received, "State catch-up finished");
        received
    }

    async fn catch_up_from(&self, peer: PeerId) -> usize {
        let facts = match self.fetch_state(peer).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(peer = %peer, error = %e, "State request failed");
                return 0;
            }
        };

        let count = facts.len();
        for fact in facts {
            self.ingest_fact(fact).await;
        }
        self.metrics.record_state_sync_facts(count as u64);
        debug!(peer = %peer, facts = count, "State received");
        count
    }

    async fn fetch_state(&self, peer: PeerId) -> GossipResult<Vec<shared_types::AttestedFact>> {
        let mut stream = self.host.open_stream(peer, STATE_PROTOCOL).await?;
        request_state(&mut stream, self.config.peer_timeout).await
    }
}
