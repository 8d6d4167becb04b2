//! Inbound port: what the routing core and revocation feeds call.

use async_trait::async_trait;
use meshmq_types::{EntityId, Proof, ProofFingerprint};

use crate::domain::entities::{Grant, Operation};
use crate::domain::errors::AuthError;

/// Authorization decisions for the broker.
#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Decides whether `subject` may perform `operation` on `resource`.
    ///
    /// `resource` is a concrete topic for publishes and a subscription
    /// pattern for subscribes; in both cases the grant covers the resource's
    /// namespace. Served from cache when a live verdict exists, otherwise
    /// verified exactly once no matter how many callers race on the same
    /// decision.
    async fn authorize(
        &self,
        operation: Operation,
        subject: &EntityId,
        resource: &str,
        proof: &Proof,
    ) -> Result<Grant, AuthError>;

    /// Drops every cached verdict derived from the fingerprinted proof, so
    /// the next request re-verifies. Returns how many verdicts were removed.
    fn invalidate(&self, fingerprint: &ProofFingerprint) -> usize;
}
