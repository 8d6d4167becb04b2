//! # Static Proof Verifier
//!
//! A [`ProofVerifier`] backed by a grant table from configuration. It stands
//! in for an external delegation-proof daemon in single-node deployments:
//! the table says who may publish or subscribe in which namespace, and every
//! accepted claim carries a bounded lifetime so cached verdicts age out the
//! same way real proofs would.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use meshmq_auth::{GrantClaim, Operation, ProofVerifier, VerifierError};
use meshmq_types::{EntityId, Proof, TimeSource};

/// One row of the grant table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticGrant {
    pub subject: EntityId,
    /// `None` grants both publish and subscribe.
    pub operation: Option<Operation>,
    pub namespace: String,
}

/// Configuration-driven verifier.
pub struct StaticVerifier {
    grants: Vec<StaticGrant>,
    grant_ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl StaticVerifier {
    pub fn new(grants: Vec<StaticGrant>, grant_ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            grants,
            grant_ttl,
            clock,
        }
    }
}

#[async_trait]
impl ProofVerifier for StaticVerifier {
    async fn verify(
        &self,
        operation: Operation,
        subject: &EntityId,
        resource: &str,
        proof: &Proof,
    ) -> Result<GrantClaim, VerifierError> {
        if proof.as_bytes().is_empty() {
            return Err(VerifierError::Rejected {
                reason: "empty proof".to_string(),
            });
        }

        let namespace = resource.split('/').next().unwrap_or_default();
        let allowed = self.grants.iter().any(|grant| {
            grant.subject == *subject
                && grant.namespace == namespace
                && grant.operation.map_or(true, |granted| granted == operation)
        });
        if !allowed {
            return Err(VerifierError::Rejected {
                reason: format!("no grant for {operation} in namespace {namespace:?}"),
            });
        }

        debug!(subject = %subject, %operation, namespace, "static grant matched");
        Ok(GrantClaim {
            namespace: namespace.to_string(),
            expires_at: self
                .clock
                .now_millis()
                .saturating_add(self.grant_ttl.as_millis() as u64),
            // The table is local configuration; there is nothing to revoke
            // out from under it.
            revocation_checked: true,
        })
    }
}
