//! Authorization domain entities.

use std::fmt;

use meshmq_types::{EntityId, ProofFingerprint};
use serde::{Deserialize, Serialize};

/// The gated operation a proof must authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Publish,
    Subscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Publish => f.write_str("publish"),
            Operation::Subscribe => f.write_str("subscribe"),
        }
    }
}

/// A positive authorization verdict handed to the routing core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Namespace the grant covers: the first segment of the authorized
    /// resource.
    pub namespace: String,
    /// When this verdict stops being honored, unix millis. Never later than
    /// the proof's own expiry or the configured verdict ceiling.
    pub expires_at: u64,
}

/// What a verifier attests after checking a proof.
///
/// The service clamps `expires_at` against its own ceiling before caching,
/// so verifiers report the proof's real expiry unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantClaim {
    /// Namespace the proof authorizes.
    pub namespace: String,
    /// Expiry of the proof itself, unix millis.
    pub expires_at: u64,
    /// False when the revocation feed could not be consulted; strict mode
    /// refuses such claims.
    pub revocation_checked: bool,
}

/// Identity of one cacheable decision.
///
/// The proof fingerprint is part of the key, so presenting a different proof
/// for the same subject and resource is a different decision, and revoking a
/// proof can find exactly the decisions that depended on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub subject: EntityId,
    pub resource: String,
    pub operation: Operation,
    pub fingerprint: ProofFingerprint,
}

/// A cached verdict, positive or negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Allowed(Grant),
    Denied,
}

#[derive(Debug, Clone)]
pub(crate) struct CachedDecision {
    pub decision: Decision,
    pub expires_at: u64,
}
