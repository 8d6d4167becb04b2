//! # Logging Peer Gateway
//!
//! Stand-in [`PeerGateway`] for single-node deployments: federation events
//! are logged and counted rather than sent anywhere. A node with no peers
//! configured still routes and stores everything it is designated for.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use meshmq_routing::{PeerError, PeerGateway};
use meshmq_types::{EntityId, Message, Pattern};

#[derive(Debug, Default)]
pub struct LoggingPeerGateway {
    forwards: AtomicU64,
    notifications: AtomicU64,
}

impl LoggingPeerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwards(&self) -> u64 {
        self.forwards.load(Ordering::Relaxed)
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PeerGateway for LoggingPeerGateway {
    async fn forward_publish(&self, namespace: &str, message: &Message) -> Result<(), PeerError> {
        self.forwards.fetch_add(1, Ordering::Relaxed);
        info!(
            namespace,
            message = %message.id,
            topic = %message.topic,
            "no peer link, dropping forward to designated router"
        );
        Ok(())
    }

    async fn notify_unsubscribe(
        &self,
        subscriber: &EntityId,
        pattern: &Pattern,
    ) -> Result<(), PeerError> {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        info!(subscriber = %subscriber, pattern = %pattern, "no peer link, dropping unsubscribe notice");
        Ok(())
    }
}
