//! # Restart Catch-Up
//!
//! A validator that restarts loses its in-memory state. On startup it asks
//! random peers for their pending facts over the state protocol, which
//! streams them back in batches of at most 100.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::AttestationGossipApi;

    use crate::harness::*;

    const SETTLE: Duration = Duration::from_secs(5);
    const FACTS: u64 = 250;

    #[tokio::test(start_paused = true)]
    async fn test_restarted_node_recovers_pending_facts() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        // Only validator 1 reports, so nothing reaches quorum.
        for height in 0..FACTS {
            net.gossip(1)
                .attest_network_fee(fee("BTC", height))
                .await
                .unwrap();
        }
        assert!(
            wait_until(SETTLE, || {
                (0..3).all(|i| net.gossip(i).tracked_counts().network_fees == FACTS as usize)
            })
            .await
        );

        net.restart(0).await;
        assert_eq!(net.gossip(0).tracked_counts().total(), 0);

        assert!(
            wait_until(SETTLE, || net.gossip(0).tracked_counts().network_fees == FACTS as usize)
                .await,
            "restarted node did not catch up"
        );
        // Both peers answered with every pending fact.
        assert_eq!(
            net.gossip(0).metrics().snapshot().state_sync_facts,
            2 * FACTS
        );
        let sample = fact_of(&fee("BTC", FACTS - 1));
        assert_eq!(net.gossip(0).attestation_count(&sample), Some(1));
        assert_eq!(net.ledger.committed_count(), 0);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_caught_up_node_completes_quorum() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        let item = fee("ETH", 42);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, &[1, 2], &item).await;
        assert!(wait_until(SETTLE, || net.gossip(0).attestation_count(&fact) == Some(2)).await);

        net.restart(0).await;
        assert!(wait_until(SETTLE, || net.gossip(0).attestation_count(&fact) == Some(2)).await);

        // The restarted node's own report is the last one needed.
        net.gossip(0).attest_network_fee(item).await.unwrap();
        assert!(wait_until(SETTLE, || net.ledger.is_committed(&fact)).await);
        assert!(wait_until(SETTLE, || net.gossip(0).is_committed(&fact)).await);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_node_has_nobody_to_ask() {
        let mut net = TestNetwork::new(1, 1, TestNetwork::default_config());
        net.start_all().await;

        assert_eq!(net.gossip(0).ask_peers().await, 0);
        assert_eq!(net.gossip(0).metrics().snapshot().state_sync_facts, 0);

        net.stop_all().await;
    }
}
