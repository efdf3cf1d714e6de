//! # Attestations and Quorum Envelopes
//!
//! An `Attestation` is one validator's ECDSA (secp256k1) signature over the
//! bincode encoding of a fact. A `Quorum<T>` carries a fact together with the
//! attestations collected for it; it is both what validators submit to the
//! ledger and what the ledger emits once a fact is committed.

use crate::entities::{ErrataTx, NetworkFee, PubKey, Solvency, TxKey, TxObservation};
use crate::errors::FactError;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// One validator's signed claim over a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attestation {
    pub pub_key: PubKey,
    /// 64-byte `r || s` signature.
    pub signature: Vec<u8>,
}

/// A fact plus the attestations gathered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum<T> {
    pub item: T,
    pub attestations: Vec<Attestation>,
}

impl<T> Quorum<T> {
    #[must_use]
    pub fn new(item: T, attestations: Vec<Attestation>) -> Self {
        Self { item, attestations }
    }

    /// Whether `pub_key` signed this quorum.
    #[must_use]
    pub fn attested_by(&self, pub_key: &PubKey) -> bool {
        self.attestations.iter().any(|a| &a.pub_key == pub_key)
    }
}

pub type QuorumTx = Quorum<TxObservation>;
pub type QuorumNetworkFee = Quorum<NetworkFee>;
pub type QuorumSolvency = Quorum<Solvency>;
pub type QuorumErrataTx = Quorum<ErrataTx>;

/// Fact categories, each tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactCategory {
    ObservedTx,
    NetworkFee,
    Solvency,
    ErrataTx,
}

impl FactCategory {
    pub const ALL: [FactCategory; 4] = [
        FactCategory::ObservedTx,
        FactCategory::NetworkFee,
        FactCategory::Solvency,
        FactCategory::ErrataTx,
    ];
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ObservedTx => "observed_tx",
            Self::NetworkFee => "network_fee",
            Self::Solvency => "solvency",
            Self::ErrataTx => "errata_tx",
        };
        f.write_str(name)
    }
}

/// Unit of exchange on the gossip wire: one quorum of any category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestedFact {
    ObservedTx(QuorumTx),
    NetworkFee(QuorumNetworkFee),
    Solvency(QuorumSolvency),
    ErrataTx(QuorumErrataTx),
}

impl AttestedFact {
    #[must_use]
    pub fn category(&self) -> FactCategory {
        match self {
            Self::ObservedTx(_) => FactCategory::ObservedTx,
            Self::NetworkFee(_) => FactCategory::NetworkFee,
            Self::Solvency(_) => FactCategory::Solvency,
            Self::ErrataTx(_) => FactCategory::ErrataTx,
        }
    }

    #[must_use]
    pub fn attestations(&self) -> &[Attestation] {
        match self {
            Self::ObservedTx(q) => &q.attestations,
            Self::NetworkFee(q) => &q.attestations,
            Self::Solvency(q) => &q.attestations,
            Self::ErrataTx(q) => &q.attestations,
        }
    }
}

/// A payload type that validators can attest to.
///
/// Ties each payload to its category, its candidate key and its variant in
/// [`AttestedFact`], so a single generic state machine can serve all four.
pub trait Attestable:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Key identifying one candidate within the category.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    const CATEGORY: FactCategory;

    fn fact_key(&self) -> Self::Key;

    fn into_fact(quorum: Quorum<Self>) -> AttestedFact;

    /// Canonical bytes that attestations sign.
    fn signing_bytes(&self) -> Result<Vec<u8>, FactError> {
        bincode::serialize(self).map_err(|e| FactError::Encoding(e.to_string()))
    }
}

impl Attestable for TxObservation {
    type Key = TxKey;
    const CATEGORY: FactCategory = FactCategory::ObservedTx;

    fn fact_key(&self) -> TxKey {
        self.key()
    }

    fn into_fact(quorum: Quorum<Self>) -> AttestedFact {
        AttestedFact::ObservedTx(quorum)
    }
}

impl Attestable for NetworkFee {
    type Key = NetworkFee;
    const CATEGORY: FactCategory = FactCategory::NetworkFee;

    fn fact_key(&self) -> NetworkFee {
        self.clone()
    }

    fn into_fact(quorum: Quorum<Self>) -> AttestedFact {
        AttestedFact::NetworkFee(quorum)
    }
}

impl Attestable for Solvency {
    type Key = String;
    const CATEGORY: FactCategory = FactCategory::Solvency;

    fn fact_key(&self) -> String {
        self.id.clone()
    }

    fn into_fact(quorum: Quorum<Self>) -> AttestedFact {
        AttestedFact::Solvency(quorum)
    }
}

impl Attestable for ErrataTx {
    type Key = ErrataTx;
    const CATEGORY: FactCategory = FactCategory::ErrataTx;

    fn fact_key(&self) -> ErrataTx {
        self.clone()
    }

    fn into_fact(quorum: Quorum<Self>) -> AttestedFact {
        AttestedFact::ErrataTx(quorum)
    }
}

// =============================================================================
// SIGNING
// =============================================================================

/// Compressed SEC1 public key of a signing key.
#[must_use]
pub fn pub_key_of(key: &SigningKey) -> PubKey {
    PubKey(key.verifying_key().to_encoded_point(true).as_bytes().to_vec())
}

/// Sign `item` with `key`.
pub fn sign_item<T: Attestable>(key: &SigningKey, item: &T) -> Result<Attestation, FactError> {
    let bytes = item.signing_bytes()?;
    let signature: Signature = key
        .try_sign(&bytes)
        .map_err(|_| FactError::SigningFailed)?;
    Ok(Attestation {
        pub_key: pub_key_of(key),
        signature: signature.to_bytes().to_vec(),
    })
}

/// Check that `attestation` is a valid signature over `item`.
pub fn verify_attestation<T: Attestable>(item: &T, attestation: &Attestation) -> Result<(), FactError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(attestation.pub_key.as_bytes())
        .map_err(|_| FactError::InvalidPublicKey)?;
    let signature =
        Signature::from_slice(&attestation.signature).map_err(|_| FactError::InvalidSignature)?;
    let bytes = item.signing_bytes()?;
    verifying_key
        .verify(&bytes, &signature)
        .map_err(|_| FactError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Chain, TxId};

    fn fee(rate: u64) -> NetworkFee {
        NetworkFee {
            chain: Chain::new("btc"),
            height: 800_000,
            transaction_size: 250,
            transaction_rate: rate,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let item = fee(25);

        let attestation = sign_item(&key, &item).unwrap();
        assert_eq!(attestation.pub_key, pub_key_of(&key));
        assert_eq!(attestation.pub_key.as_bytes().len(), 33);
        assert!(verify_attestation(&item, &attestation).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_item() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let attestation = sign_item(&key, &fee(25)).unwrap();

        assert_eq!(
            verify_attestation(&fee(26), &attestation),
            Err(FactError::SignatureMismatch)
        );
    }

    #[test]
    fn test_verify_rejects_garbage_key() {
        let attestation = Attestation {
            pub_key: PubKey(vec![9; 33]),
            signature: vec![0; 64],
        };
        assert_eq!(
            verify_attestation(&fee(1), &attestation),
            Err(FactError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_into_fact_category() {
        let errata = ErrataTx {
            chain: Chain::new("eth"),
            id: TxId("0xdead".into()),
        };
        let fact = ErrataTx::into_fact(Quorum::new(errata, vec![]));
        assert_eq!(fact.category(), FactCategory::ErrataTx);
        assert!(fact.attestations().is_empty());
    }

    #[test]
    fn test_attested_by() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let item = fee(3);
        let attestation = sign_item(&key, &item).unwrap();
        let quorum = Quorum::new(item, vec![attestation]);

        assert!(quorum.attested_by(&pub_key_of(&key)));
        assert!(!quorum.attested_by(&PubKey(vec![1; 33])));
    }
}
