//! Main loop: reconcile ticks, startup, semaphore pruning and shutdown.

use shared_types::{ErrataTx, NetworkFee, Solvency, TxObservation};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use super::{AttestationGossip, Tracked};
use crate::config::{params, SEMAPHORE_PRUNE_INTERVAL};

impl AttestationGossip {
    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Network parameters are applied before anything else runs. Ledger
    /// events start flowing after the ask-peers delay. When this returns the
    /// event client has stopped and no handler is running.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.observe_reconcile_interval;
        info!(
            reconcile_ms = interval.as_millis() as u64,
            ask_peers_delay_ms = self.config.ask_peers_delay.as_millis() as u64,
            "Attestation gossip starting"
        );
        self.apply_network_parameters().await;

        let (batcher_stop, batcher_rx) = watch::channel(false);
        let batcher_task = tokio::spawn(self.batcher.clone().run(batcher_rx));

        let now = Instant::now();
        let mut reconcile = interval_at(now + interval, interval);
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prune = interval_at(now + SEMAPHORE_PRUNE_INTERVAL, SEMAPHORE_PRUNE_INTERVAL);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let startup = tokio::time::sleep(self.config.ask_peers_delay);
        tokio::pin!(startup);
        let mut started = false;

        loop {
            tokio::select! {
                _ = reconcile.tick() => {
                    self.reconcile(Instant::now()).await;
                }
                _ = &mut startup, if !started => {
                    started = true;
                    match self.event_client.start() {
                        Ok(()) => info!("Ledger event delivery started"),
                        Err(e) => error!(error = %e, "Failed to start ledger event delivery"),
                    }
                    let gossip = self.clone();
                    tokio::spawn(async move {
                        gossip.ask_peers().await;
                    });
                }
                _ = prune.tick() => {
                    let now = Instant::now();
                    let sends = self.batcher.peer_manager().prune(now);
                    let receives = self.receives.prune(now);
                    trace!(sends, receives, "Peer slots pruned");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.event_client.stop().await;
        let _ = batcher_stop.send(true);
        if let Err(e) = batcher_task.await {
            error!(error = %e, "Batcher task failed");
        }
        info!("Attestation gossip stopped");
    }

    /// One reconcile pass: expire, re-send late, re-read tunables.
    pub async fn reconcile(&self, now: Instant) {
        self.reconcile_category::<TxObservation>(now).await;
        self.reconcile_category::<NetworkFee>(now).await;
        self.reconcile_category::<Solvency>(now).await;
        self.reconcile_category::<ErrataTx>(now).await;

        let evicted = self.keysign_parties.prune(now);
        if evicted > 0 {
            trace!(evicted, "Keysign party cache pruned");
        }

        self.apply_network_parameters().await;
    }

    async fn reconcile_category<T: Tracked>(&self, now: Instant) {
        let outcome = T::states(self).reconcile(
            now,
            self.config.late_observe_timeout,
            self.config.non_quorum_timeout,
            self.config.min_time_between_attestations,
        );

        if outcome.pruned > 0 {
            debug!(category = %T::CATEGORY, pruned = outcome.pruned, "Expired states removed");
            self.metrics.record_states_pruned(outcome.pruned as u64);
        }
        for quorum in outcome.late_sends {
            debug!(category = %T::CATEGORY, "Late re-send");
            self.metrics.record_late_send();
            self.submit(T::into_fact(quorum)).await;
        }
    }

    /// Hot-apply the dynamic tunables. Unset or non-positive values leave the
    /// current setting alone. Receives never drop below sends.
    async fn apply_network_parameters(&self) {
        if let Some(size) = self.network_parameter(params::MAX_BATCH_SIZE).await {
            self.batcher.set_max_batch_size(size);
        }

        let sends = self.batcher.peer_manager();
        if let Some(limit) = self.network_parameter(params::PEER_CONCURRENT_SENDS).await {
            sends.update_limit(limit);
        }

        let receives = self
            .network_parameter(params::PEER_CONCURRENT_RECEIVES)
            .await
            .unwrap_or_else(|| self.receives.limit());
        self.receives.update_limit(receives.max(sends.limit()));
    }

    async fn network_parameter(&self, name: &str) -> Option<usize> {
        match self.bridge.get_network_parameter(name).await {
            Ok(value) if value > 0 => usize::try_from(value).ok(),
            Ok(_) => None,
            Err(e) => {
                debug!(name, error = %e, "Network parameter unavailable");
                None
            }
        }
    }
}
