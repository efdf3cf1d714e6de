//! Outbound ports (SPI) for attestation gossip.
//!
//! Everything the coordinator needs from the outside world: a peer transport
//! that can open protocol streams, the ledger layer it submits to and polls,
//! its own signing key, and the observation layer it notifies on commit.

use async_trait::async_trait;
use futures::future::BoxFuture;
use k256::ecdsa::SigningKey;
use shared_types::{AttestedFact, ObservedTx, PubKey};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::PeerId;
use crate::error::GossipResult;

/// A bidirectional byte stream to one peer.
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> DuplexStream for S {}

/// Boxed peer stream.
pub type PeerStream = Box<dyn DuplexStream>;

/// Callback for an inbound stream on a registered protocol.
pub type StreamHandler = Arc<dyn Fn(PeerId, PeerStream) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`StreamHandler`].
pub fn stream_handler<F, Fut>(f: F) -> StreamHandler
where
    F: Fn(PeerId, PeerStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |peer, stream| -> BoxFuture<'static, ()> { Box::pin(f(peer, stream)) })
}

/// Peer-to-peer host: connection management and stream multiplexing live
/// behind this trait.
#[async_trait]
pub trait PeerHost: Send + Sync {
    fn local_peer_id(&self) -> PeerId;

    /// Peers currently reachable.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Open a new stream to `peer` speaking `protocol`.
    async fn open_stream(&self, peer: PeerId, protocol: &'static str) -> GossipResult<PeerStream>;

    /// Route inbound streams for `protocol` to `handler`.
    fn set_stream_handler(&self, protocol: &'static str, handler: StreamHandler);
}

/// Ledger layer: accepts attestations and serves dynamic parameters.
#[async_trait]
pub trait LedgerBridge: Send + Sync {
    /// Submit attestations for a fact. Used for first sends and late re-sends.
    async fn submit(&self, fact: AttestedFact) -> GossipResult<()>;

    /// Validators allowed to co-sign for `vault`.
    async fn get_keysign_party(&self, vault: &PubKey) -> GossipResult<Vec<PubKey>>;

    /// Current value of a dynamic network parameter. Non-positive means unset.
    async fn get_network_parameter(&self, name: &str) -> GossipResult<i64>;
}

/// Source of this validator's signing key.
pub trait KeyProvider: Send + Sync {
    fn signing_key(&self) -> GossipResult<SigningKey>;
}

/// Observation layer callback.
pub trait ObservationSink: Send + Sync {
    /// An observed transaction this validator attested to was committed.
    fn handle_observed_tx_committed(&self, obs_tx: &ObservedTx);
}
