//! # MeshMQ Types Crate
//!
//! Shared vocabulary for the broker. Every type that crosses a crate boundary
//! lives here: entity identities, topics and subscription patterns, messages,
//! authorization proofs, the key-value storage port, and the time source.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-crate types are defined once, here.
//! - **Validated at the Edge**: `Topic` and `Pattern` can only be constructed
//!   through parsing, so downstream code never re-validates syntax.
//! - **Ports, Not Backends**: storage and time are traits; production adapters
//!   live in the node crate, in-memory implementations live here for tests.

pub mod entities;
pub mod errors;
pub mod record;
pub mod storage;
pub mod time;
pub mod topic;

pub use entities::*;
pub use errors::*;
pub use record::*;
pub use storage::*;
pub use time::*;
pub use topic::*;
