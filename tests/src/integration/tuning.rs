//! # Runtime Tuning
//!
//! Batch size and per-peer concurrency follow ledger network parameters,
//! applied on the next reconcile tick without a restart.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::config::params;
    use attestation_gossip::AttestationGossipApi;

    use crate::harness::*;

    const TICK: Duration = Duration::from_millis(250);

    #[tokio::test(start_paused = true)]
    async fn test_parameters_reach_every_node() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        net.ledger.set_parameter(params::MAX_BATCH_SIZE, 7);
        net.ledger.set_parameter(params::PEER_CONCURRENT_SENDS, 6);
        net.ledger.set_parameter(params::PEER_CONCURRENT_RECEIVES, 2);
        tokio::time::sleep(TICK).await;

        for i in 0..3 {
            let gossip = net.gossip(i);
            assert_eq!(gossip.batcher().max_batch_size(), 7);
            assert_eq!(gossip.batcher().peer_manager().limit(), 6);
            // Receives never drop below sends.
            assert_eq!(gossip.receive_manager().limit(), 6);
        }

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_batches_still_deliver_everything() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;
        net.ledger.set_parameter(params::MAX_BATCH_SIZE, 7);
        tokio::time::sleep(TICK).await;

        for height in 0..20 {
            net.gossip(0)
                .attest_network_fee(fee("BTC", height))
                .await
                .unwrap();
        }

        assert!(
            wait_until(Duration::from_secs(2), || {
                (1..3).all(|i| net.gossip(i).tracked_counts().network_fees == 20)
            })
            .await
        );
        // At least three batches per peer.
        assert!(net.gossip(0).metrics().snapshot().batches_sent >= 6);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unset_or_invalid_parameters_keep_config() {
        let mut net = TestNetwork::new(2, 2, TestNetwork::default_config());
        net.start_all().await;

        net.ledger.set_parameter(params::MAX_BATCH_SIZE, -5);
        tokio::time::sleep(TICK).await;

        let gossip = net.gossip(0);
        assert_eq!(gossip.batcher().max_batch_size(), gossip.config().max_batch_size);
        assert_eq!(
            gossip.batcher().peer_manager().limit(),
            gossip.config().peer_concurrent_sends
        );
        assert_eq!(
            gossip.receive_manager().limit(),
            gossip.config().peer_concurrent_receives
        );

        net.stop_all().await;
    }
}
