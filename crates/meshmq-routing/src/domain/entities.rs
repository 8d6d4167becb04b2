//! Routing domain entities.

use meshmq_types::{EntityId, Pattern, Proof, ProofFingerprint};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a subscription came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionOrigin {
    /// A client connected to this node.
    Local,
    /// Mirrored here on behalf of a federated peer; the peer is told when
    /// the subscription goes away.
    Peer,
}

/// An active, authorized interest in a topic pattern.
///
/// Keyed by `(subscriber, pattern)`: re-subscribing to the same pattern
/// refreshes this record instead of adding a second one. The same record is
/// what gets written durably, checksummed, for restart recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber: EntityId,
    pub pattern: Pattern,
    /// Whether matched persistent messages are queued while the subscriber
    /// is offline.
    pub persist: bool,
    pub origin: SubscriptionOrigin,
    /// Absolute expiry, unix millis. Expired subscriptions never match,
    /// swept or not.
    pub expires_at: u64,
    /// Fingerprint of the delegation proof this subscription was granted
    /// under.
    pub proof_fingerprint: ProofFingerprint,
}

/// A subscribe call as received from a connection server or peer.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub subscriber: EntityId,
    /// Pattern string, validated by the routing core.
    pub pattern: String,
    /// Requested lifetime; clamped to the configured maximum.
    pub ttl: Duration,
    pub persist: bool,
    pub origin: SubscriptionOrigin,
    pub proof: Proof,
}

/// What a successful subscribe reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionReceipt {
    pub pattern: Pattern,
    /// The granted absolute expiry after clamping, unix millis.
    pub expires_at: u64,
}

/// Where a publish entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOrigin {
    /// From a client connected to this node.
    Local,
    /// Relayed from a federated peer.
    Peer,
}

/// A publish call as received from a connection server or peer.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Topic string, validated by the routing core.
    pub topic: String,
    pub payload: Vec<u8>,
    pub source: EntityId,
    /// Request durable queueing for matched offline subscribers.
    pub persist: bool,
    pub origin: PublishOrigin,
    pub proof: Proof,
}

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishReceipt {
    /// Subscriptions the topic matched, one per `(subscriber, pattern)`.
    pub matched: usize,
    /// Subscribers the message was handed to, live or durable.
    pub handed: usize,
    /// Subscribers whose durable enqueue failed. Failures are isolated: the
    /// rest of the fan-out proceeded.
    pub failed: Vec<EntityId>,
}

/// Outcome of an unsubscribe. A missing subscription is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotFound,
}

/// Totals from one expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Expired subscriptions removed from the index.
    pub removed: usize,
    /// Peer notifications emitted for mirrored subscriptions.
    pub notified: usize,
    /// Durable entries purged for subscribers left with no subscriptions.
    pub purged_entries: u64,
}
