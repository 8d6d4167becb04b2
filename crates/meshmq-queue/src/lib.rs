//! # MeshMQ Queue Crate
//!
//! Durable per-subscriber FIFO queues over ordered key-value storage. When an
//! authorized subscriber is offline, the routing core hands matched messages
//! to the [`QueueManager`] here; they are drained in order when the
//! subscriber reconnects and removed on acknowledgement or expiry.
//!
//! ## Key Layout (queue column)
//!
//! ```text
//! ent: || subscriber (32 bytes) || seq (8 bytes, big-endian)  -> QueueEntry
//! ctr: || subscriber (32 bytes)                               -> last seq (8 bytes, big-endian)
//! ```
//!
//! Big-endian sequence encoding makes lexicographic key order equal numeric
//! order, so a prefix scan yields a subscriber's backlog oldest-first.
//!
//! ## Invariants
//!
//! - **I. Ordered**: sequence numbers per subscriber are strictly increasing
//!   and never reused; the counter is committed in the same atomic batch as
//!   the entry it numbers.
//! - **II. Atomic**: an enqueue is one batch write; a crash leaves either the
//!   full entry plus counter or neither.
//! - **III. Isolated**: queues for different subscribers share no locks, so
//!   a slow or failing enqueue never stalls another subscriber.
//! - **IV. Tolerant**: entries that fail checksum or decode are skipped on
//!   drain and removed on eviction, never aborting the surrounding scan.

pub mod domain;
pub mod service;

pub use domain::entities::QueueEntry;
pub use domain::errors::QueueError;
pub use service::{DrainedBacklog, QueueManager, RetentionReport};
