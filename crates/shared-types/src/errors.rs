//! # Error Types
//!
//! Errors raised while encoding, signing or verifying facts.

use thiserror::Error;

/// Errors from fact encoding and attestation verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    /// The fact could not be serialized to its canonical bytes.
    #[error("Fact encoding failed: {0}")]
    Encoding(String),

    /// The attesting public key is not a valid secp256k1 point.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// The signature bytes are malformed.
    #[error("Invalid signature encoding")]
    InvalidSignature,

    /// Well-formed signature that does not match the fact.
    #[error("Signature does not match fact")]
    SignatureMismatch,

    /// The signer refused to produce a signature.
    #[error("Signing failed")]
    SigningFailed,
}
