//! Static key provider.

use k256::ecdsa::SigningKey;

use crate::error::{GossipError, GossipResult};
use crate::ports::outbound::KeyProvider;

/// Serves a fixed key, or fails if constructed without one.
#[derive(Clone)]
pub struct StaticKeyProvider {
    key: Option<SigningKey>,
}

impl StaticKeyProvider {
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key: Some(key) }
    }

    #[must_use]
    pub fn random() -> Self {
        Self::new(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Parse a 32-byte hex secret.
    pub fn from_hex(secret: &str) -> GossipResult<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| GossipError::MissingKey(format!("invalid hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| GossipError::MissingKey("invalid secp256k1 secret".to_string()))?;
        Ok(Self::new(key))
    }

    /// A provider with no key material.
    #[must_use]
    pub fn empty() -> Self {
        Self { key: None }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn signing_key(&self) -> GossipResult<SigningKey> {
        self.key
            .clone()
            .ok_or_else(|| GossipError::MissingKey("no key configured".to_string()))
    }
}
