//! # Terminus
//!
//! The routing core. Every subscribe and publish is authorized before it has
//! any effect; matched messages go to live subscribers over bounded channels
//! and to the durable queues for absent persistent subscribers when this
//! node is the designated router for the namespace.
//!
//! ## Ordering
//!
//! Subscription records are written durably before the index is updated, and
//! deleted before the index entry is removed. A crash can therefore leave a
//! record the index does not know about yet (rebuilt or discarded on the
//! next start) but never a routable subscription with no durable record.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use meshmq_auth::{AuthError, AuthorizationApi, Operation};
use meshmq_queue::QueueManager;
use meshmq_types::{
    decode_record, encode_record, Column, EntityId, KeyValueStore, Message, Pattern, TimeSource,
    Topic,
};

use crate::delivery::{Delivery, DeliveryHandle, DeliveryRegistry, OfferOutcome};
use crate::domain::entities::{
    PublishOrigin, PublishReceipt, PublishRequest, SubscribeRequest, Subscription,
    SubscriptionOrigin, SubscriptionReceipt, SweepReport, UnsubscribeOutcome,
};
use crate::domain::errors::RoutingError;
use crate::domain::keys::{subscription_key, SUBSCRIPTION_PREFIX};
use crate::domain::trie::PatternTrie;
use crate::ports::inbound::RoutingApi;
use crate::ports::outbound::PeerGateway;

/// Tunables for the routing core.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Namespaces this node is the designated router for. Persistent
    /// messages in other namespaces are forwarded, not stored.
    pub designated_namespaces: Vec<String>,
    /// Hard ceiling on subscription lifetimes; requests above it are
    /// clamped.
    pub max_subscription_ttl: Duration,
    /// Per-subscriber delivery channel capacity. When full, new deliveries
    /// to that subscriber are dropped.
    pub delivery_buffer: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            designated_namespaces: Vec::new(),
            max_subscription_ttl: Duration::from_secs(24 * 60 * 60),
            delivery_buffer: 256,
        }
    }
}

/// The routing core: subscription index, fan-out, and federation edge.
pub struct Terminus {
    designated: HashSet<String>,
    max_subscription_ttl: Duration,
    trie: PatternTrie,
    registry: Arc<DeliveryRegistry>,
    auth: Arc<dyn AuthorizationApi>,
    queues: Arc<QueueManager>,
    peers: Arc<dyn PeerGateway>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    forward_failures: AtomicU64,
}

impl Terminus {
    /// Builds the routing core and rebuilds the subscription index from
    /// durable records. Expired and unreadable records are deleted rather
    /// than restored.
    pub fn new(
        config: RoutingConfig,
        auth: Arc<dyn AuthorizationApi>,
        queues: Arc<QueueManager>,
        peers: Arc<dyn PeerGateway>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RoutingError> {
        let terminus = Self {
            designated: config.designated_namespaces.into_iter().collect(),
            max_subscription_ttl: config.max_subscription_ttl,
            trie: PatternTrie::new(),
            registry: Arc::new(DeliveryRegistry::new(config.delivery_buffer)),
            auth,
            queues,
            peers,
            store,
            clock,
            forward_failures: AtomicU64::new(0),
        };
        terminus.restore_subscriptions()?;
        Ok(terminus)
    }

    fn restore_subscriptions(&self) -> Result<(), RoutingError> {
        let now = self.clock.now_millis();
        let mut restored = 0usize;
        let mut discarded = 0usize;
        for (key, value) in self.store.scan_prefix(Column::Persist, SUBSCRIPTION_PREFIX)? {
            match decode_record::<Subscription>(&value) {
                Ok(subscription) if subscription.expires_at > now => {
                    self.trie.insert(subscription);
                    restored += 1;
                }
                Ok(_) => {
                    self.store.delete(Column::Persist, &key)?;
                    discarded += 1;
                }
                Err(error) => {
                    warn!(%error, "discarding unreadable subscription record");
                    self.store.delete(Column::Persist, &key)?;
                    discarded += 1;
                }
            }
        }
        if restored > 0 || discarded > 0 {
            info!(restored, discarded, "subscription index rebuilt");
        }
        Ok(())
    }

    /// Opens a delivery channel for `subscriber`. A second attach supersedes
    /// the first. Queued backlog is not drained here; call
    /// [`flush_backlog`](Self::flush_backlog) once the consumer is ready.
    pub fn attach(&self, subscriber: EntityId) -> DeliveryHandle {
        DeliveryRegistry::attach(&self.registry, subscriber)
    }

    /// Offers the subscriber's durable backlog to its live channel, oldest
    /// first, stopping at the first delivery that does not fit. Entries stay
    /// queued until [`ack`](Self::ack)ed, so nothing is lost if the
    /// subscriber disappears mid-drain. Returns how many entries were
    /// handed over.
    pub fn flush_backlog(&self, subscriber: &EntityId) -> Result<u64, RoutingError> {
        if !self.registry.is_attached(subscriber) {
            return Ok(0);
        }
        let mut offered = 0u64;
        for entry in self.queues.drain(subscriber)? {
            let delivery = Delivery {
                message: Arc::new(entry.message),
                pattern: None,
                seq: Some(entry.seq),
            };
            match self.registry.offer(subscriber, delivery) {
                OfferOutcome::Delivered => offered += 1,
                OfferOutcome::BufferFull | OfferOutcome::NotConnected => break,
            }
        }
        if offered > 0 {
            debug!(subscriber = %subscriber, offered, "backlog flushed");
        }
        Ok(offered)
    }

    /// Acknowledges one drained queue entry, removing it durably. Returns
    /// whether the entry still existed.
    pub fn ack(&self, subscriber: &EntityId, seq: u64) -> Result<bool, RoutingError> {
        Ok(self.queues.ack(subscriber, seq)?)
    }

    /// Removes expired subscriptions from the index and storage, notifies
    /// peers about mirrored ones, and purges queues whose subscriber has no
    /// live subscription left.
    pub async fn sweep_expired(&self) -> SweepReport {
        let now = self.clock.now_millis();
        let mut report = SweepReport::default();
        let mut affected: HashSet<EntityId> = HashSet::new();

        for subscription in self.trie.expired(now) {
            // Re-checked under the index write lock: a refresh that raced
            // with the snapshot wins.
            if self
                .trie
                .remove_if_expired(&subscription.subscriber, &subscription.pattern, now)
                .is_none()
            {
                continue;
            }
            let key = subscription_key(&subscription.subscriber, &subscription.pattern);
            if let Err(error) = self.store.delete(Column::Persist, &key) {
                warn!(
                    subscriber = %subscription.subscriber,
                    pattern = %subscription.pattern,
                    %error,
                    "failed to delete expired subscription record"
                );
            }
            report.removed += 1;
            affected.insert(subscription.subscriber);

            if subscription.origin == SubscriptionOrigin::Peer {
                match self
                    .peers
                    .notify_unsubscribe(&subscription.subscriber, &subscription.pattern)
                    .await
                {
                    Ok(()) => report.notified += 1,
                    Err(error) => warn!(
                        subscriber = %subscription.subscriber,
                        pattern = %subscription.pattern,
                        %error,
                        "peer expiry notification failed"
                    ),
                }
            }
        }

        for subscriber in affected {
            if self.trie.has_live(&subscriber, now) {
                continue;
            }
            match self.queues.purge(&subscriber) {
                Ok(purged) => report.purged_entries += purged,
                Err(error) => {
                    warn!(subscriber = %subscriber, %error, "queue purge failed")
                }
            }
        }

        if report.removed > 0 {
            info!(
                removed = report.removed,
                notified = report.notified,
                purged = report.purged_entries,
                "expired subscriptions swept"
            );
        }
        report
    }

    /// Subscriptions currently indexed, live and not yet swept.
    pub fn subscription_count(&self) -> usize {
        self.trie.subscription_count()
    }

    /// Live deliveries dropped because a subscriber buffer was full.
    pub fn deliveries_dropped(&self) -> u64 {
        self.registry.dropped_total()
    }

    /// Persistent publishes that could not be forwarded to their designated
    /// router.
    pub fn forward_failures(&self) -> u64 {
        self.forward_failures.load(Ordering::Relaxed)
    }

    fn is_designated(&self, namespace: &str) -> bool {
        self.designated.contains(namespace)
    }
}

#[async_trait]
impl RoutingApi for Terminus {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<SubscriptionReceipt, RoutingError> {
        let pattern = Pattern::parse(&request.pattern)?;
        if request.ttl.is_zero() {
            return Err(RoutingError::ZeroTtl);
        }

        let grant = self
            .auth
            .authorize(
                Operation::Subscribe,
                &request.subscriber,
                pattern.as_str(),
                &request.proof,
            )
            .await?;
        if grant.namespace != pattern.namespace() {
            return Err(RoutingError::Auth(AuthError::Denied));
        }

        let now = self.clock.now_millis();
        let ttl = request.ttl.min(self.max_subscription_ttl);
        let expires_at = now.saturating_add(ttl.as_millis() as u64);
        let subscription = Subscription {
            subscriber: request.subscriber,
            pattern: pattern.clone(),
            persist: request.persist,
            origin: request.origin,
            expires_at,
            proof_fingerprint: request.proof.fingerprint(),
        };

        let record = encode_record(&subscription)?;
        let key = subscription_key(&request.subscriber, &pattern);
        self.store.put(Column::Persist, &key, &record)?;
        self.trie.insert(subscription);
        info!(
            subscriber = %request.subscriber,
            pattern = %pattern,
            expires_at,
            "subscription registered"
        );

        // A reconnecting subscriber usually re-subscribes right after
        // attaching; hand over whatever queued up while it was away.
        if let Err(error) = self.flush_backlog(&request.subscriber) {
            warn!(subscriber = %request.subscriber, %error, "backlog flush failed");
        }

        Ok(SubscriptionReceipt {
            pattern,
            expires_at,
        })
    }

    async fn unsubscribe(
        &self,
        subscriber: &EntityId,
        pattern: &str,
    ) -> Result<UnsubscribeOutcome, RoutingError> {
        let pattern = Pattern::parse(pattern)?;
        if self.trie.get(subscriber, &pattern).is_none() {
            return Ok(UnsubscribeOutcome::NotFound);
        }

        let key = subscription_key(subscriber, &pattern);
        self.store.delete(Column::Persist, &key)?;
        self.trie.remove(subscriber, &pattern);

        if let Err(error) = self.peers.notify_unsubscribe(subscriber, &pattern).await {
            warn!(
                subscriber = %subscriber,
                pattern = %pattern,
                %error,
                "peer unsubscribe notification failed"
            );
        }
        info!(subscriber = %subscriber, pattern = %pattern, "subscription removed");
        Ok(UnsubscribeOutcome::Removed)
    }

    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, RoutingError> {
        let topic = Topic::parse(&request.topic)?;
        let grant = self
            .auth
            .authorize(
                Operation::Publish,
                &request.source,
                topic.as_str(),
                &request.proof,
            )
            .await?;
        if grant.namespace != topic.namespace() {
            return Err(RoutingError::Auth(AuthError::Denied));
        }

        let now = self.clock.now_millis();
        let namespace = topic.namespace().to_string();
        let designated = self.is_designated(&namespace);

        if request.persist && !designated {
            match request.origin {
                // A peer routed a durable message here by mistake; refuse
                // before anything is delivered or stored.
                PublishOrigin::Peer => {
                    return Err(RoutingError::NotDesignatedRouter { namespace });
                }
                PublishOrigin::Local => {}
            }
        }

        let message = Arc::new(Message {
            id: Uuid::new_v4(),
            topic,
            payload: request.payload,
            source: request.source,
            persist: request.persist,
            published_at: now,
        });

        if message.persist && !designated {
            // Local durable traffic is the designated router's to store.
            // Forwarding failure does not stop live delivery here; the
            // message just loses durability until the peer link recovers.
            if let Err(error) = self.peers.forward_publish(&namespace, &message).await {
                self.forward_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    namespace = %namespace,
                    message = %message.id,
                    %error,
                    "forward to designated router failed"
                );
            }
        }

        let matches = self.trie.matches(&message.topic, now);
        let mut receipt = PublishReceipt {
            matched: matches.len(),
            ..PublishReceipt::default()
        };

        for subscription in matches {
            let delivery = Delivery {
                message: Arc::clone(&message),
                pattern: Some(subscription.pattern.clone()),
                seq: None,
            };
            match self.registry.offer(&subscription.subscriber, delivery) {
                OfferOutcome::Delivered => receipt.handed += 1,
                OfferOutcome::BufferFull => {
                    warn!(
                        subscriber = %subscription.subscriber,
                        topic = %message.topic,
                        "delivery buffer full, message dropped"
                    );
                }
                OfferOutcome::NotConnected => {
                    if designated && message.persist && subscription.persist {
                        match self.queues.enqueue(&subscription.subscriber, message.as_ref()) {
                            Ok(seq) => {
                                debug!(
                                    subscriber = %subscription.subscriber,
                                    seq,
                                    topic = %message.topic,
                                    "message queued for absent subscriber"
                                );
                                receipt.handed += 1;
                            }
                            Err(error) => {
                                error!(
                                    subscriber = %subscription.subscriber,
                                    topic = %message.topic,
                                    %error,
                                    "durable enqueue failed"
                                );
                                receipt.failed.push(subscription.subscriber);
                            }
                        }
                    }
                }
            }
        }

        Ok(receipt)
    }
}
