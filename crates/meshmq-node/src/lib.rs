//! # MeshMQ Node
//!
//! The broker executable. It loads configuration, opens RocksDB, wires the
//! authorization service and the routing core together, runs the periodic
//! sweeps, and shuts everything down in order.
//!
//! ## Modular Structure
//!
//! - `config` - sectioned node configuration with file and env loading
//! - `adapters` - production implementations of the outbound ports
//! - `runtime` - broker assembly, background tasks, graceful shutdown

pub mod adapters;
pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use runtime::{BrokerRuntime, RuntimeError};
