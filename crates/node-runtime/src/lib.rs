//! # Bridge Node Runtime
//!
//! Library side of the `bridge-node` binary, exposed for tests.
//!
//! - `config` - TOML and environment configuration
//! - `devnet` - in-process validator set driving attestation gossip

#![allow(clippy::type_complexity)]

pub mod config;
pub mod devnet;

pub use config::{ConfigError, NodeConfig, NodeSection};
pub use devnet::{CommitCounter, Devnet, DevnetValidator};
