//! # Partition and Recovery
//!
//! Batches to an unreachable peer are dropped, not retried. A node that was
//! cut off recovers the missed attestations through the state protocol once
//! it is reachable again.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::AttestationGossipApi;

    use crate::harness::*;

    const SETTLE: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn test_isolated_node_recovers_and_completes_quorum() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.set_online(2, false);
        net.start_all().await;

        let item = fee("BTC", 900);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, &[0, 1], &item).await;

        assert!(wait_until(SETTLE, || net.gossip(1).attestation_count(&fact) == Some(2)).await);
        assert!(
            wait_until(SETTLE, || net.gossip(0).metrics().snapshot().batches_failed >= 1).await
        );
        assert_eq!(net.gossip(2).attestation_count(&fact), None);
        assert!(!net.ledger.is_committed(&fact));

        net.set_online(2, true);
        // Startup found no peers. Each peer now returns its one pending fact.
        assert_eq!(net.gossip(2).ask_peers().await, 2);
        assert_eq!(net.gossip(2).attestation_count(&fact), Some(2));

        net.gossip(2).attest_network_fee(item).await.unwrap();
        assert!(wait_until(SETTLE, || net.ledger.is_committed(&fact)).await);
        assert!(
            wait_until(SETTLE, || (0..3).all(|i| net.gossip(i).is_committed(&fact))).await
        );

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_batches_are_not_redelivered() {
        let mut net = TestNetwork::new(2, 2, TestNetwork::default_config());
        net.start_all().await;
        net.set_online(1, false);

        let item = fee("ETH", 31);
        let fact = fact_of(&item);
        net.gossip(0).attest_network_fee(item).await.unwrap();
        assert!(
            wait_until(SETTLE, || net.gossip(0).metrics().snapshot().batches_failed >= 1).await
        );

        net.set_online(1, true);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(net.gossip(1).attestation_count(&fact), None);
        assert_eq!(net.gossip(0).batcher().pending(&net.gossip(1).peer_id()), 0);

        net.stop_all().await;
    }
}
