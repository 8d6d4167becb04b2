//! # Authorization Service
//!
//! Cache-first authorization with single-flight verification. The hot path
//! is a read-locked map lookup; only cache misses reach the verifier, and
//! concurrent misses on the same decision share one verification.
//!
//! Outcome handling:
//!
//! - allowed claims are cached until `min(proof expiry, now + verdict ceiling)`
//! - rejections are cached for the verdict ceiling
//! - timeouts and verifier unavailability are never cached, so the next
//!   request retries

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use meshmq_types::{EntityId, Proof, ProofFingerprint, TimeSource};

use crate::domain::cache::DecisionCache;
use crate::domain::entities::{CacheKey, Decision, Grant, Operation};
use crate::domain::errors::{AuthError, VerifierError};
use crate::ports::inbound::AuthorizationApi;
use crate::ports::outbound::ProofVerifier;

/// Tuning for the authorization service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deadline for a single proof verification.
    pub verifier_timeout: Duration,
    /// Longest a verdict may be cached, regardless of proof expiry.
    pub max_verdict_ttl: Duration,
    /// Maximum number of cached decisions.
    pub cache_capacity: usize,
    /// Refuse claims whose revocation status could not be checked.
    pub strict_revocation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verifier_timeout: Duration::from_secs(2),
            max_verdict_ttl: Duration::from_secs(300),
            cache_capacity: 16_384,
            strict_revocation: false,
        }
    }
}

/// Proof-gated authorization with a decision cache.
pub struct AuthService {
    config: AuthConfig,
    cache: DecisionCache,
    verifier: Arc<dyn ProofVerifier>,
    clock: Arc<dyn TimeSource>,
    /// One async mutex per decision currently being verified. The first
    /// caller verifies while later callers wait on the same mutex and then
    /// find the verdict in the cache.
    inflight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        verifier: Arc<dyn ProofVerifier>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let cache = DecisionCache::new(config.cache_capacity);
        Self {
            config,
            cache,
            verifier,
            clock,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Number of verdicts currently cached.
    pub fn cached_verdicts(&self) -> usize {
        self.cache.len()
    }

    fn verdict_ttl_millis(&self) -> u64 {
        self.config.max_verdict_ttl.as_millis() as u64
    }

    /// Runs one verification and caches what is cacheable.
    async fn verify_and_cache(&self, key: &CacheKey, proof: &Proof) -> Result<Grant, AuthError> {
        let outcome = tokio::time::timeout(
            self.config.verifier_timeout,
            self.verifier
                .verify(key.operation, &key.subject, &key.resource, proof),
        )
        .await;

        let now = self.clock.now_millis();
        match outcome {
            Err(_elapsed) => {
                let timeout_ms = self.config.verifier_timeout.as_millis() as u64;
                tracing::warn!(
                    subject = %key.subject,
                    resource = %key.resource,
                    operation = %key.operation,
                    timeout_ms,
                    "proof verification timed out"
                );
                Err(AuthError::Timeout { timeout_ms })
            }
            Ok(Err(VerifierError::Rejected { reason })) => {
                tracing::debug!(
                    subject = %key.subject,
                    resource = %key.resource,
                    operation = %key.operation,
                    reason,
                    "proof rejected"
                );
                self.cache.insert(
                    key.clone(),
                    Decision::Denied,
                    now + self.verdict_ttl_millis(),
                    now,
                );
                Err(AuthError::Denied)
            }
            Ok(Err(VerifierError::Unavailable(detail))) => {
                tracing::warn!(
                    subject = %key.subject,
                    resource = %key.resource,
                    detail,
                    "verifier unavailable, failing closed"
                );
                Err(AuthError::Denied)
            }
            Ok(Ok(claim)) => {
                if self.config.strict_revocation && !claim.revocation_checked {
                    tracing::warn!(
                        subject = %key.subject,
                        resource = %key.resource,
                        "revocation status unknown under strict mode, denying"
                    );
                    return Err(AuthError::Denied);
                }
                let expires_at = claim.expires_at.min(now + self.verdict_ttl_millis());
                if expires_at <= now {
                    tracing::debug!(
                        subject = %key.subject,
                        resource = %key.resource,
                        "proof already expired"
                    );
                    self.cache.insert(
                        key.clone(),
                        Decision::Denied,
                        now + self.verdict_ttl_millis(),
                        now,
                    );
                    return Err(AuthError::Denied);
                }
                let grant = Grant {
                    namespace: claim.namespace,
                    expires_at,
                };
                self.cache.insert(
                    key.clone(),
                    Decision::Allowed(grant.clone()),
                    expires_at,
                    now,
                );
                tracing::debug!(
                    subject = %key.subject,
                    resource = %key.resource,
                    operation = %key.operation,
                    expires_at,
                    "proof verified"
                );
                Ok(grant)
            }
        }
    }

    fn flight_for(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock();
        Arc::clone(
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Removes the flight entry, but only if it is still ours; a later
    /// request may already have started a fresh flight under the same key.
    fn clear_flight(&self, key: &CacheKey, flight: &Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self.inflight.lock();
        if let Some(current) = inflight.get(key) {
            if Arc::ptr_eq(current, flight) {
                inflight.remove(key);
            }
        }
    }
}

#[async_trait]
impl AuthorizationApi for AuthService {
    async fn authorize(
        &self,
        operation: Operation,
        subject: &EntityId,
        resource: &str,
        proof: &Proof,
    ) -> Result<Grant, AuthError> {
        let key = CacheKey {
            subject: *subject,
            resource: resource.to_string(),
            operation,
            fingerprint: proof.fingerprint(),
        };

        if let Some(decision) = self.cache.lookup(&key, self.clock.now_millis()) {
            return match decision {
                Decision::Allowed(grant) => Ok(grant),
                Decision::Denied => Err(AuthError::Denied),
            };
        }

        let flight = self.flight_for(&key);
        let _leader = flight.lock().await;

        // A previous flight may have settled this decision while we waited.
        if let Some(decision) = self.cache.lookup(&key, self.clock.now_millis()) {
            self.clear_flight(&key, &flight);
            return match decision {
                Decision::Allowed(grant) => Ok(grant),
                Decision::Denied => Err(AuthError::Denied),
            };
        }

        let result = self.verify_and_cache(&key, proof).await;
        self.clear_flight(&key, &flight);
        result
    }

    fn invalidate(&self, fingerprint: &ProofFingerprint) -> usize {
        let removed = self.cache.invalidate(fingerprint);
        if removed > 0 {
            tracing::info!(
                fingerprint = %fingerprint,
                removed,
                "invalidated cached verdicts for revoked proof"
            );
        }
        removed
    }
}

// =============================================================================
// TESTS
// =============================================================================
