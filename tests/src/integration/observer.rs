//! # Commit Notifications
//!
//! When an observed transaction commits, the observation layer of every
//! validator that attested to it is told, so it can stop re-reporting.
//! Validators that never attested are not told.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use attestation_gossip::AttestationGossipApi;
    use shared_types::pub_key_of;

    use crate::harness::*;

    const SETTLE: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn test_attesters_notified_on_commit() {
        let mut net = TestNetwork::new(3, 2, TestNetwork::default_config());
        net.start_all().await;

        let observation = inbound(1, pub_key_of(&random_key()));
        let fact = fact_of(&observation);
        for i in [0, 1] {
            net.gossip(i)
                .attest_observed_tx(observation.clone())
                .await
                .unwrap();
        }

        assert!(wait_until(SETTLE, || net.validators[1].sink.committed().len() == 1).await);
        assert!(wait_until(SETTLE, || net.validators[0].sink.committed().len() == 1).await);
        assert_eq!(net.validators[0].sink.committed()[0], observation.obs_tx);

        // Validator 2 tracked the fact but never attested.
        assert!(wait_until(SETTLE, || net.gossip(2).is_committed(&fact)).await);
        assert!(net.validators[2].sink.committed().is_empty());

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_signed_by_keysign_party() {
        let mut net = TestNetwork::new(3, 3, TestNetwork::default_config());
        let vault = pub_key_of(&random_key());
        let members: Vec<_> = net.validators.iter().map(Validator::pub_key).collect();
        net.ledger.set_keysign_party(vault.clone(), members);
        net.start_all().await;

        let observation = outbound(2, vault);
        let fact = fact_of(&observation);
        for i in 0..3 {
            net.gossip(i)
                .attest_observed_tx(observation.clone())
                .await
                .unwrap();
        }

        assert!(wait_until(SETTLE, || net.ledger.is_committed(&fact)).await);
        for i in 0..3 {
            assert!(wait_until(SETTLE, || net.validators[i].sink.committed().len() == 1).await);
        }

        net.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fee_commit_does_not_notify_observers() {
        let mut net = TestNetwork::new(2, 2, TestNetwork::default_config());
        net.start_all().await;

        let item = fee("BTC", 77);
        let fact = fact_of(&item);
        attest_fee_in_order(&net, &[0, 1], &item).await;

        assert!(wait_until(SETTLE, || net.gossip(0).is_committed(&fact)).await);
        assert!(net.validators[0].sink.committed().is_empty());

        net.stop_all().await;
    }
}
