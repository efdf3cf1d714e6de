//! # Integration Scenarios
//!
//! Each module drives a full [`TestNetwork`](crate::harness::TestNetwork)
//! through one behaviour of the gossip layer.

pub mod catch_up;
pub mod expiry;
pub mod fee_gossip;
pub mod observer;
pub mod partition;
pub mod tuning;
