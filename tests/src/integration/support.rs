//! Shared fixtures: a broker wired end to end over in-memory storage, a
//! scripted proof verifier, and a peer gateway that records federation
//! traffic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use meshmq_auth::{
    AuthConfig, AuthService, AuthorizationApi, GrantClaim, Operation, ProofVerifier,
    VerifierError,
};
use meshmq_queue::QueueManager;
use meshmq_routing::{
    PeerError, PeerGateway, PublishOrigin, PublishRequest, RoutingConfig, SubscribeRequest,
    SubscriptionOrigin, Terminus,
};
use meshmq_types::{
    EntityId, KeyValueStore, ManualTimeSource, MemoryStore, Message, Pattern, Proof, TimeSource,
};

/// Where the manual clock starts, unix millis.
pub const START: u64 = 1_700_000_000_000;

pub fn entity(tag: u8) -> EntityId {
    EntityId::new([tag; 32])
}

/// Verifier that grants whatever namespace the resource sits in. Counts
/// calls so cache behavior is observable, can be flipped to refuse
/// everything, which scripts a revocation, and can pin the granted
/// namespace to something that does not cover the resource.
pub struct ScriptedVerifier {
    calls: AtomicUsize,
    deny: AtomicBool,
    pinned_namespace: Mutex<Option<String>>,
    claim_ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl ScriptedVerifier {
    pub fn new(claim_ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            deny: AtomicBool::new(false),
            pinned_namespace: Mutex::new(None),
            claim_ttl,
            clock,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn deny_everything(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn pin_namespace(&self, namespace: &str) {
        *self.pinned_namespace.lock() = Some(namespace.to_string());
    }
}

#[async_trait]
impl ProofVerifier for ScriptedVerifier {
    async fn verify(
        &self,
        _operation: Operation,
        _subject: &EntityId,
        resource: &str,
        _proof: &Proof,
    ) -> Result<GrantClaim, VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(VerifierError::Rejected {
                reason: "proof revoked".to_string(),
            });
        }
        let namespace = self
            .pinned_namespace
            .lock()
            .clone()
            .unwrap_or_else(|| resource.split('/').next().unwrap_or(resource).to_string());
        Ok(GrantClaim {
            namespace,
            expires_at: self
                .clock
                .now_millis()
                .saturating_add(self.claim_ttl.as_millis() as u64),
            revocation_checked: true,
        })
    }
}

/// Peer gateway that records every forward and notification, and can be
/// told to fail so outage handling is testable.
#[derive(Default)]
pub struct RecordingPeerGateway {
    forwards: Mutex<Vec<(String, Message)>>,
    unsubscribes: Mutex<Vec<(EntityId, Pattern)>>,
    unreachable: AtomicBool,
}

impl RecordingPeerGateway {
    pub fn forwards(&self) -> Vec<(String, Message)> {
        self.forwards.lock().clone()
    }

    pub fn unsubscribes(&self) -> Vec<(EntityId, Pattern)> {
        self.unsubscribes.lock().clone()
    }

    pub fn set_unreachable(&self, down: bool) {
        self.unreachable.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerGateway for RecordingPeerGateway {
    async fn forward_publish(&self, namespace: &str, message: &Message) -> Result<(), PeerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PeerError::Unreachable("scripted outage".to_string()));
        }
        self.forwards
            .lock()
            .push((namespace.to_string(), message.clone()));
        Ok(())
    }

    async fn notify_unsubscribe(
        &self,
        subscriber: &EntityId,
        pattern: &Pattern,
    ) -> Result<(), PeerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PeerError::Unreachable("scripted outage".to_string()));
        }
        self.unsubscribes.lock().push((*subscriber, pattern.clone()));
        Ok(())
    }
}

/// A broker assembled the way the node assembles one, with every seam
/// swapped for an observable test double: manual clock, in-memory store,
/// scripted verifier, recording peer gateway.
pub struct Broker {
    pub terminus: Arc<Terminus>,
    pub auth: Arc<AuthService>,
    pub queues: Arc<QueueManager>,
    pub verifier: Arc<ScriptedVerifier>,
    pub peers: Arc<RecordingPeerGateway>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualTimeSource>,
}

pub fn broker(designated: &[&str]) -> Broker {
    broker_over(
        designated,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualTimeSource::new(START)),
    )
}

/// Assembles the broker over caller-owned storage and clock. Restart tests
/// hand the same store to a second instance.
pub fn broker_over(
    designated: &[&str],
    store: Arc<MemoryStore>,
    clock: Arc<ManualTimeSource>,
) -> Broker {
    let verifier = Arc::new(ScriptedVerifier::new(
        Duration::from_secs(600),
        Arc::clone(&clock) as Arc<dyn TimeSource>,
    ));
    let auth = Arc::new(AuthService::new(
        AuthConfig::default(),
        Arc::clone(&verifier) as Arc<dyn ProofVerifier>,
        Arc::clone(&clock) as Arc<dyn TimeSource>,
    ));
    let queues = Arc::new(QueueManager::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>
    ));
    let peers = Arc::new(RecordingPeerGateway::default());
    let config = RoutingConfig {
        designated_namespaces: designated.iter().map(|ns| ns.to_string()).collect(),
        max_subscription_ttl: Duration::from_secs(3_600),
        delivery_buffer: 8,
    };
    let terminus = Terminus::new(
        config,
        Arc::clone(&auth) as Arc<dyn AuthorizationApi>,
        Arc::clone(&queues),
        Arc::clone(&peers) as Arc<dyn PeerGateway>,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::clone(&clock) as Arc<dyn TimeSource>,
    )
    .expect("broker fixture should assemble over an empty store");
    Broker {
        terminus: Arc::new(terminus),
        auth,
        queues,
        verifier,
        peers,
        store,
        clock,
    }
}

/// A local subscribe request with a ten-minute lifetime.
pub fn subscribe(subscriber: EntityId, pattern: &str, persist: bool) -> SubscribeRequest {
    SubscribeRequest {
        subscriber,
        pattern: pattern.to_string(),
        ttl: Duration::from_secs(600),
        persist,
        origin: SubscriptionOrigin::Local,
        proof: Proof::new(format!("sub:{pattern}").into_bytes()),
    }
}

/// A local publish request.
pub fn publish(source: EntityId, topic: &str, payload: &[u8], persist: bool) -> PublishRequest {
    PublishRequest {
        topic: topic.to_string(),
        payload: payload.to_vec(),
        source,
        persist,
        origin: PublishOrigin::Local,
        proof: Proof::new(format!("pub:{topic}").into_bytes()),
    }
}
