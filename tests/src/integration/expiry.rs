//! # Late Sends and Expiry
//!
//! A fact that only one validator reports is re-submitted by that validator
//! on reconcile ticks and dropped everywhere once the non-quorum timeout
//! passes. A committed fact is dropped once the late-observe window closes.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::{AttestationGossipApi, GossipConfig};
    use shared_types::{pub_key_of, Chain, Coin, PubKey, Solvency};

    use crate::harness::*;

    fn short_expiry() -> GossipConfig {
        GossipConfig {
            non_quorum_timeout: Duration::from_secs(2),
            ..GossipConfig::for_testing()
        }
    }

    fn solvency(vault: PubKey) -> Solvency {
        Solvency::new(
            Chain::new("BTC"),
            vault,
            vec![Coin::new("BTC.BTC", 12_000_000)],
            810_000,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_report_resent_then_dropped() {
        let mut net = TestNetwork::new(3, 3, short_expiry());
        net.start_all().await;

        let item = solvency(pub_key_of(&random_key()));
        let fact = fact_of(&item);
        net.gossip(0).attest_solvency(item).await.unwrap();
        assert!(
            wait_until(Duration::from_secs(1), || {
                (0..3).all(|i| net.gossip(i).attestation_count(&fact) == Some(1))
            })
            .await
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(net.gossip(0).metrics().snapshot().late_sends >= 1);
        // Only the node holding its own attestation resends.
        assert_eq!(net.gossip(1).metrics().snapshot().late_sends, 0);
        assert!(!net.ledger.is_committed(&fact));

        tokio::time::sleep(Duration::from_secs(2)).await;
        for i in 0..3 {
            assert_eq!(net.gossip(i).attestation_count(&fact), None, "node {i}");
            assert!(net.gossip(i).metrics().snapshot().states_pruned >= 1);
        }
        assert_eq!(net.gossip(0).tracked_counts().total(), 0);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_committed_fact_dropped_after_late_window() {
        let mut net = TestNetwork::new(3, 2, short_expiry());
        net.start_all().await;

        let item = fee("BTC", 3);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, &[0, 1], &item).await;
        assert!(wait_until(Duration::from_secs(1), || net.gossip(0).is_committed(&fact)).await);
        let late_sends = net.gossip(0).metrics().snapshot().late_sends;

        // Late-observe window is 400 ms; one reconcile tick later it is gone.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(net.gossip(0).attestation_count(&fact), None);
        // Committed facts are never resent.
        assert_eq!(net.gossip(0).metrics().snapshot().late_sends, late_sends);
        assert_eq!(net.ledger.committed_count(), 1);

        net.stop_all().await;
    }
}
