//! In-process adapters for the outbound ports.
//!
//! Used by the devnet runtime and the integration tests. A production node
//! would plug a real p2p host and ledger client in their place.

pub mod keys;
pub mod memory_ledger;
pub mod memory_network;

pub use keys::StaticKeyProvider;
pub use memory_ledger::InMemoryLedger;
pub use memory_network::{MemoryHost, MemoryNetwork};
