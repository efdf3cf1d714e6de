//! # Peer Identity and the Active Validator Set
//!
//! A validator's peer id is the SHA-256 of its compressed secp256k1 public
//! key. The active set is replaced wholesale on every churn notification, so
//! readers always see either the old set or the new one.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use shared_types::PubKey;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{GossipError, GossipResult};

/// Transport-level identity of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the peer id of a validator key.
    ///
    /// The key must be a valid secp256k1 point; it is re-encoded compressed
    /// before hashing so both SEC1 forms map to the same id.
    pub fn from_pub_key(pub_key: &PubKey) -> GossipResult<Self> {
        let digest = Sha256::digest(compressed(pub_key)?.as_bytes());
        let mut id = [0u8; 32];
        id.copy_from_slice(&digest);
        Ok(Self(id))
    }
}

/// `pub_key` re-encoded in compressed SEC1 form.
fn compressed(pub_key: &PubKey) -> GossipResult<PubKey> {
    let key = k256::PublicKey::from_sec1_bytes(pub_key.as_bytes())
        .map_err(|_| GossipError::InvalidAttestation(shared_types::FactError::InvalidPublicKey))?;
    let point = k256::elliptic_curve::sec1::ToEncodedPoint::to_encoded_point(&key, true);
    Ok(PubKey(point.as_bytes().to_vec()))
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

/// Immutable snapshot of the active validators.
#[derive(Debug, Default)]
pub struct ValidatorSet {
    peers: HashSet<PeerId>,
    pub_keys: HashSet<PubKey>,
}

impl ValidatorSet {
    #[must_use]
    pub fn contains_peer(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    #[must_use]
    pub fn contains_key(&self, pub_key: &PubKey) -> bool {
        self.pub_keys.contains(pub_key)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Copy-on-write holder of the current [`ValidatorSet`].
///
/// Never locked together with a category lock: callers take a snapshot
/// first and release this lock before touching attestation state.
#[derive(Debug, Default)]
pub struct ActiveValidators {
    current: RwLock<Arc<ValidatorSet>>,
}

impl ActiveValidators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set. Keys are stored compressed, the form attestations
    /// carry. Keys that are not valid secp256k1 points are logged and skipped.
    pub fn set(&self, pub_keys: &[PubKey]) {
        let mut next = ValidatorSet::default();
        for pub_key in pub_keys {
            match compressed(pub_key).and_then(|key| Ok((PeerId::from_pub_key(&key)?, key))) {
                Ok((peer, key)) => {
                    next.peers.insert(peer);
                    next.pub_keys.insert(key);
                }
                Err(e) => warn!(pub_key = %pub_key, error = %e, "Skipping invalid validator key"),
            }
        }
        info!(validators = next.len(), "Active validator set updated");
        *self.current.write() = Arc::new(next);
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<ValidatorSet> {
        self.current.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
