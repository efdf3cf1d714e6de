//! # Fact Payloads
//!
//! The four categories of candidate facts a validator attests to, plus the
//! small primitives they are built from.
//!
//! ## Categories
//!
//! - **Observed transactions**: `TxObservation` (inbound or outbound)
//! - **Network fees**: `NetworkFee`
//! - **Solvency reports**: `Solvency`
//! - **Errata**: `ErrataTx`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// External chain ticker (e.g. `BTC`, `ETH`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chain(String);

impl Chain {
    /// Build a chain identifier; tickers are normalised to upper case.
    #[must_use]
    pub fn new(ticker: &str) -> Self {
        Self(ticker.to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External transaction id as reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compressed secp256k1 public key (33 bytes, SEC1).
///
/// Used both for validator identities and for vault keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PubKey(pub Vec<u8>);

impl PubKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({self})")
    }
}

/// An amount of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    pub asset: String,
    pub amount: u64,
}

impl Coin {
    #[must_use]
    pub fn new(asset: &str, amount: u64) -> Self {
        Self {
            asset: asset.to_ascii_uppercase(),
            amount,
        }
    }
}

// =============================================================================
// OBSERVED TRANSACTIONS
// =============================================================================

/// A transaction seen on an external chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: String,
    pub to_address: String,
    pub coins: Vec<Coin>,
    pub gas: Vec<Coin>,
    pub memo: String,
}

/// A transaction together with where, and by which vault, it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedTx {
    pub tx: Tx,
    /// External block height the transaction was included at.
    pub block_height: u64,
    /// Height at which the chain client considers it final.
    pub finalise_height: u64,
    /// Vault that sent or received the transaction.
    pub observed_pub_key: PubKey,
    /// Height of the keysign that produced an outbound, zero for inbound.
    pub keysign_ms: i64,
}

impl ObservedTx {
    /// Whether the observation has reached its finalisation height.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.block_height >= self.finalise_height
    }

    /// Hex SHA-256 over the fields that must match for two validators to be
    /// attesting to the same observation.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tx.chain.as_str().as_bytes());
        hasher.update(self.tx.id.0.as_bytes());
        hasher.update(self.tx.from_address.as_bytes());
        hasher.update(self.tx.to_address.as_bytes());
        for coin in self.tx.coins.iter().chain(self.tx.gas.iter()) {
            hasher.update(coin.asset.as_bytes());
            hasher.update(coin.amount.to_be_bytes());
        }
        hasher.update(self.tx.memo.as_bytes());
        hasher.update(self.block_height.to_be_bytes());
        hasher.update(self.finalise_height.to_be_bytes());
        hasher.update(self.observed_pub_key.as_bytes());
        hex::encode_upper(hasher.finalize())
    }
}

/// The observed-transaction category item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxObservation {
    pub obs_tx: ObservedTx,
    pub inbound: bool,
    pub allow_future_observation: bool,
}

impl TxObservation {
    #[must_use]
    pub fn inbound(obs_tx: ObservedTx) -> Self {
        Self {
            obs_tx,
            inbound: true,
            allow_future_observation: false,
        }
    }

    #[must_use]
    pub fn outbound(obs_tx: ObservedTx) -> Self {
        Self {
            obs_tx,
            inbound: false,
            allow_future_observation: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> TxKey {
        TxKey {
            chain: self.obs_tx.tx.chain.clone(),
            id: self.obs_tx.tx.id.clone(),
            unique_hash: self.obs_tx.content_hash(),
            allow_future_observation: self.allow_future_observation,
            finalized: self.obs_tx.is_final(),
            inbound: self.inbound,
        }
    }
}

/// Identity of one observed-transaction candidate.
///
/// The same external transaction yields two keys across its life: one for the
/// pre-finalisation observation and one for the final observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxKey {
    pub chain: Chain,
    pub id: TxId,
    pub unique_hash: String,
    pub allow_future_observation: bool,
    pub finalized: bool,
    pub inbound: bool,
}

// =============================================================================
// NETWORK FEES, SOLVENCY, ERRATA
// =============================================================================

/// Fee rate observed on an external chain at a given height.
///
/// The whole report is its own key: validators reporting different rates
/// for the same height are attesting to different facts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkFee {
    pub chain: Chain,
    pub height: u64,
    pub transaction_size: u64,
    pub transaction_rate: u64,
}

/// A vault balance report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solvency {
    /// Hex SHA-256 over the remaining fields.
    pub id: String,
    pub chain: Chain,
    pub pub_key: PubKey,
    pub coins: Vec<Coin>,
    pub height: u64,
}

impl Solvency {
    #[must_use]
    pub fn new(chain: Chain, pub_key: PubKey, coins: Vec<Coin>, height: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(chain.as_str().as_bytes());
        hasher.update(pub_key.as_bytes());
        for coin in &coins {
            hasher.update(coin.asset.as_bytes());
            hasher.update(coin.amount.to_be_bytes());
        }
        hasher.update(height.to_be_bytes());
        Self {
            id: hex::encode_upper(hasher.finalize()),
            chain,
            pub_key,
            coins,
            height,
        }
    }
}

/// Retraction of a previously observed transaction (e.g. after a reorg).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrataTx {
    pub chain: Chain,
    pub id: TxId,
}
