//! Outbound port: the peer gateway the router drives to reach the rest of
//! the mesh.

use async_trait::async_trait;
use meshmq_types::{EntityId, Message, Pattern};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
}

/// Federation link to neighbouring routers.
#[async_trait]
pub trait PeerGateway: Send + Sync {
    /// Hands a persistent publish to the designated router for
    /// `namespace`.
    async fn forward_publish(&self, namespace: &str, message: &Message) -> Result<(), PeerError>;

    /// Tells peers a subscription is gone so they stop forwarding matching
    /// traffic towards this router.
    async fn notify_unsubscribe(
        &self,
        subscriber: &EntityId,
        pattern: &Pattern,
    ) -> Result<(), PeerError>;
}
