//! In-memory peer mesh.
//!
//! Streams are `tokio::io::duplex` pipes. Opening a stream spawns the
//! target's registered handler on the far end. Hosts can be taken offline to
//! simulate partitions, and replaced under the same id to simulate restarts.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::domain::PeerId;
use crate::error::{GossipError, GossipResult};
use crate::ports::outbound::{PeerHost, PeerStream, StreamHandler};

const STREAM_BUFFER: usize = 64 * 1024;

/// Registry of hosts that can reach each other.
#[derive(Default)]
pub struct MemoryNetwork {
    hosts: RwLock<HashMap<PeerId, Arc<MemoryHost>>>,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a fresh host. Replaces any host already registered as `id`.
    pub fn add_host(self: &Arc<Self>, id: PeerId) -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost {
            id,
            network: Arc::downgrade(self),
            handlers: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        });
        self.hosts.write().insert(id, host.clone());
        host
    }

    pub fn remove_host(&self, id: &PeerId) {
        self.hosts.write().remove(id);
    }

    fn get(&self, id: &PeerId) -> Option<Arc<MemoryHost>> {
        self.hosts.read().get(id).cloned()
    }
}

/// One node's view of the mesh.
pub struct MemoryHost {
    id: PeerId,
    network: Weak<MemoryNetwork>,
    handlers: RwLock<HashMap<&'static str, StreamHandler>>,
    online: AtomicBool,
}

impl MemoryHost {
    /// Take the host on or off the mesh.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerHost for MemoryHost {
    fn local_peer_id(&self) -> PeerId {
        self.id
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        if !self.is_online() {
            return Vec::new();
        }
        let Some(network) = self.network.upgrade() else {
            return Vec::new();
        };
        let hosts = network.hosts.read();
        hosts
            .values()
            .filter(|h| h.id != self.id && h.is_online())
            .map(|h| h.id)
            .collect()
    }

    async fn open_stream(&self, peer: PeerId, protocol: &'static str) -> GossipResult<PeerStream> {
        if !self.is_online() {
            return Err(GossipError::transport(peer, "local host offline"));
        }
        let network = self
            .network
            .upgrade()
            .ok_or_else(|| GossipError::transport(peer, "network shut down"))?;
        let target = network
            .get(&peer)
            .filter(|h| h.is_online())
            .ok_or_else(|| GossipError::transport(peer, "peer unreachable"))?;
        let handler = target
            .handlers
            .read()
            .get(protocol)
            .cloned()
            .ok_or_else(|| GossipError::transport(peer, format!("protocol {protocol} not supported")))?;

        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        debug!(from = %self.id, to = %peer, protocol, "Stream opened");
        tokio::spawn(handler(self.id, Box::new(remote)));
        Ok(Box::new(local))
    }

    fn set_stream_handler(&self, protocol: &'static str, handler: StreamHandler) {
        self.handlers.write().insert(protocol, handler);
    }
}
