//! Ports for the attestation gossip subsystem.

pub mod inbound;
pub mod outbound;
