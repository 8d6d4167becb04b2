//! Outbound port: the proof verifier the service drives on cache misses.

use async_trait::async_trait;
use meshmq_types::{EntityId, Proof};

use crate::domain::entities::{GrantClaim, Operation};
use crate::domain::errors::VerifierError;

/// Verifies authorization proofs.
///
/// Implementations may call out to an external verification daemon; the
/// service wraps every call in its configured deadline, so verifiers do not
/// need their own timeout handling.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Checks that `proof` authorizes `subject` to perform `operation` on
    /// `resource` (a concrete topic for publish, a pattern for subscribe).
    async fn verify(
        &self,
        operation: Operation,
        subject: &EntityId,
        resource: &str,
        proof: &Proof,
    ) -> Result<GrantClaim, VerifierError>;
}
