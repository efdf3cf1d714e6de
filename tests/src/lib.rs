//! # Bridge Attestation Test Suite
//!
//! Whole-network scenarios: several validators, each running its own
//! `AttestationGossip`, wired over the in-memory mesh to one simulated ledger.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # TestNetwork builder, restart and partition helpers
//! │
//! └── integration/      # Cross-validator scenarios
//!     ├── fee_gossip.rs
//!     ├── catch_up.rs
//!     ├── expiry.rs
//!     ├── tuning.rs
//!     ├── observer.rs
//!     └── partition.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bridge-tests
//!
//! # One scenario, with gossip logs
//! RUST_LOG=attestation_gossip=debug cargo test -p bridge-tests integration::catch_up
//! ```

#![allow(dead_code)]

pub mod harness;
pub mod integration;
