//! Production implementations of the broker's outbound ports.

pub mod peer_gateway;
pub mod rocksdb_store;
pub mod static_verifier;

pub use peer_gateway::LoggingPeerGateway;
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
pub use static_verifier::{StaticGrant, StaticVerifier};
