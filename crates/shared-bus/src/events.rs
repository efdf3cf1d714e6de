//! # Ledger Events
//!
//! Commit notifications emitted by the ledger layer once a fact reaches
//! quorum. Each event carries the bincode-encoded `Quorum<T>` that satisfied
//! quorum, so subscribers decode with the payload type matching the kind.

use crate::BusError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{AttestedFact, FactCategory, Quorum};

/// The four commit event kinds, one per fact category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ObservedTxCommitted,
    NetworkFeeCommitted,
    SolvencyCommitted,
    ErrataTxCommitted,
}

impl LedgerEventKind {
    #[must_use]
    pub fn for_category(category: FactCategory) -> Self {
        match category {
            FactCategory::ObservedTx => Self::ObservedTxCommitted,
            FactCategory::NetworkFee => Self::NetworkFeeCommitted,
            FactCategory::Solvency => Self::SolvencyCommitted,
            FactCategory::ErrataTx => Self::ErrataTxCommitted,
        }
    }

    #[must_use]
    pub fn category(self) -> FactCategory {
        match self {
            Self::ObservedTxCommitted => FactCategory::ObservedTx,
            Self::NetworkFeeCommitted => FactCategory::NetworkFee,
            Self::SolvencyCommitted => FactCategory::Solvency,
            Self::ErrataTxCommitted => FactCategory::ErrataTx,
        }
    }
}

/// One commit notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: LedgerEventKind,
    /// Ledger height the commit happened at.
    pub height: u64,
    pub payload: Vec<u8>,
}

impl LedgerEvent {
    /// Build a commit event for an attested fact.
    pub fn committed(fact: &AttestedFact, height: u64) -> Result<Self, BusError> {
        let kind = LedgerEventKind::for_category(fact.category());
        let payload = match fact {
            AttestedFact::ObservedTx(q) => bincode::serialize(q),
            AttestedFact::NetworkFee(q) => bincode::serialize(q),
            AttestedFact::Solvency(q) => bincode::serialize(q),
            AttestedFact::ErrataTx(q) => bincode::serialize(q),
        }
        .map_err(|e| BusError::Encoding(e.to_string()))?;
        Ok(Self {
            kind,
            height,
            payload,
        })
    }

    /// Decode the payload as the quorum type matching `kind`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Quorum<T>, BusError> {
        bincode::deserialize(&self.payload).map_err(|e| BusError::Encoding(e.to_string()))
    }
}
