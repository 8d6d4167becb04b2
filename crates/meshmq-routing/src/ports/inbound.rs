//! Inbound port: the routing API exposed to broker frontends.

use async_trait::async_trait;
use meshmq_types::EntityId;

use crate::domain::entities::{
    PublishReceipt, PublishRequest, SubscribeRequest, SubscriptionReceipt, UnsubscribeOutcome,
};
use crate::domain::errors::RoutingError;

/// Primary API for publish and subscribe traffic.
///
/// Every call carries an authorization proof; the router rejects the
/// operation before any side effect when the proof does not check out.
#[async_trait]
pub trait RoutingApi: Send + Sync {
    /// Registers (or refreshes) a subscription.
    ///
    /// The pattern may use `+` for one segment and a trailing `#` for the
    /// rest. The granted lifetime is the requested TTL clamped to the
    /// router's maximum; the receipt reports the actual expiry.
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<SubscriptionReceipt, RoutingError>;

    /// Removes a subscription and notifies peers so they stop forwarding
    /// matching traffic. Unknown subscriptions report
    /// [`UnsubscribeOutcome::NotFound`] rather than an error.
    async fn unsubscribe(
        &self,
        subscriber: &EntityId,
        pattern: &str,
    ) -> Result<UnsubscribeOutcome, RoutingError>;

    /// Routes a message to every matching subscription: connected
    /// subscribers get it live, disconnected persistent ones get it queued
    /// when this router is designated for the namespace.
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, RoutingError>;
}
