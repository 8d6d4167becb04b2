//! Routing errors.

use meshmq_auth::AuthError;
use meshmq_queue::QueueError;
use meshmq_types::{RecordError, StorageError, ValidationError};
use thiserror::Error;

/// Failures a routing operation can report.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The topic or pattern was malformed. Checked before authorization.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Subscriptions must have a positive lifetime.
    #[error("subscription ttl must be greater than zero")]
    ZeroTtl,

    /// Authorization denied or could not complete.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A persistent publish arrived from a peer, but this node is not the
    /// designated router for the namespace. Nothing was delivered or stored.
    #[error("not the designated router for namespace {namespace:?}")]
    NotDesignatedRouter { namespace: String },

    /// The subscription store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The durable queue engine failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A durable record could not be encoded.
    #[error(transparent)]
    Record(#[from] RecordError),
}
