//! # Network Fee Gossip
//!
//! Three validators report the same fee. Whatever the order, every node ends
//! with exactly one attestation per validator and the ledger commits once.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::{AttestationGossipApi, LedgerBridge};
    use futures::future::join_all;

    use crate::harness::*;

    const SETTLE: Duration = Duration::from_secs(2);

    async fn run_order(order: &[usize]) {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        let item = fee("BTC", 100);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, order, &item).await;

        assert!(
            wait_until(SETTLE, || net.ledger.is_committed(&fact)).await,
            "order {order:?} never committed"
        );
        assert!(
            wait_until(SETTLE, || (0..3).all(|i| net.gossip(i).is_committed(&fact))).await,
            "order {order:?}: commit not seen by every node"
        );
        for i in 0..3 {
            assert!(
                wait_until(SETTLE, || net.gossip(i).attestation_count(&fact) == Some(3)).await,
                "order {order:?}: node {i} missing attestations"
            );
        }
        assert_eq!(net.ledger.signer_count(&fact), 3);
        assert_eq!(net.ledger.committed_count(), 1);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fee_commits_for_every_order() {
        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0], [2, 1, 0]] {
            run_order(&order).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reports_commit_once() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        let item = fee("ETH", 7);
        let fact = fact_of(&item);
        let reports = (0..3).map(|i| net.gossip(i).attest_network_fee(item.clone()));
        for result in join_all(reports).await {
            result.unwrap();
        }

        assert!(wait_until(SETTLE, || net.ledger.is_committed(&fact)).await);
        assert!(
            wait_until(SETTLE, || {
                (0..3).all(|i| net.gossip(i).attestation_count(&fact) == Some(3))
            })
            .await
        );
        assert_eq!(net.ledger.committed_count(), 1);

        // Repeated reports after commit change nothing.
        let submissions = net.ledger.submission_count();
        net.gossip(0).attest_network_fee(item).await.unwrap();
        assert_eq!(net.ledger.submission_count(), submissions);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_attester_still_reaches_ledger() {
        let mut net = TestNetwork::new(3, 2, TestNetwork::default_config());
        net.start_all().await;

        let item = fee("BTC", 55);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, &[0, 1], &item).await;
        assert!(wait_until(SETTLE, || net.gossip(2).is_committed(&fact)).await);
        assert_eq!(net.ledger.signer_count(&fact), 2);

        // Inside the late-observe window the third attestation is recorded.
        net.gossip(2).attest_network_fee(item).await.unwrap();
        assert_eq!(net.ledger.signer_count(&fact), 3);
        assert_eq!(net.ledger.committed_count(), 1);

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_ahead_of_gossip_leaves_nothing_pending() {
        let mut net = TestNetwork::new(3, 2, TestNetwork::default_config());
        net.start_all().await;

        // Validators 1 and 2 reach the ledger directly and the block closes
        // before any node has seen gossip for the fee.
        let item = fee("ETH", 12);
        let fact = fact_of(&item);
        net.ledger.submit(signed_by(&net, &[1, 2], &item)).await.unwrap();
        assert_eq!(net.ledger.end_block().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(net.gossip(0).attestation_count(&fact), None);

        // Their own reports are already on chain: nothing is resubmitted.
        attest_fee_in_order(&net, &[1, 2], &item).await;
        assert_eq!(net.ledger.submission_count(), 1);
        assert!(net.gossip(1).is_committed(&fact));

        // A validator outside the commit still gets its attestation recorded.
        net.gossip(0).attest_network_fee(item).await.unwrap();
        assert!(net.gossip(0).is_committed(&fact));
        assert!(wait_until(SETTLE, || net.gossip(1).attestation_count(&fact) == Some(2)).await);
        assert_eq!(net.ledger.signer_count(&fact), 3);
        assert_eq!(net.ledger.committed_count(), 1);
        for i in 0..3 {
            assert!(net.gossip(i).pending_facts().is_empty(), "node {i}");
        }

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_chains_tracked_separately() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        net.start_all().await;

        for chain in ["BTC", "ETH", "LTC"] {
            attest_fee_in_order(&net, &[0, 1, 2], &fee(chain, 9)).await;
        }

        assert!(wait_until(SETTLE, || net.ledger.committed_count() == 3).await);
        assert!(
            wait_until(SETTLE, || (0..3).all(|i| net.gossip(i).tracked_counts().network_fees == 3))
                .await
        );

        net.stop_all().await;
    }
}
