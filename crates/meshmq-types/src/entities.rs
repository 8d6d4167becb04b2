//! # Core Domain Entities
//!
//! Identities, authorization proofs, and the message envelope that flows
//! through routing, queueing, and storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::topic::Topic;

/// Unique identifier for a publishing or subscribing entity.
///
/// Entities are identified by a 32-byte value derived from their public key
/// material. The broker treats it as opaque: it is a routing and queueing key,
/// never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EntityId(pub [u8; 32]);

impl EntityId {
    /// Wraps raw identity bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Decodes a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let raw = hex::decode(s).map_err(|e| ValidationError::InvalidIdentity {
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| ValidationError::InvalidIdentity {
                reason: "identity must be exactly 32 bytes".to_string(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Content hash of a [`Proof`], used as a cache and invalidation key.
///
/// Two byte-identical proofs always produce the same fingerprint, so a
/// revocation feed can invalidate every cached verdict that depended on a
/// proof without re-parsing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofFingerprint(pub [u8; 32]);

impl fmt::Display for ProofFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// An opaque authorization proof presented with a publish or subscribe.
///
/// The broker never interprets proof contents; only the verifier adapter
/// does. Everything else handles proofs by fingerprint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    content: Vec<u8>,
}

impl Proof {
    /// Wraps encoded proof bytes.
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    /// The encoded proof bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// SHA-256 over the encoded proof bytes.
    pub fn fingerprint(&self) -> ProofFingerprint {
        let digest = Sha256::digest(&self.content);
        ProofFingerprint(digest.into())
    }
}

// Proof contents stay out of logs; only length and fingerprint are shown.
impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Proof(len={}, fingerprint={})",
            self.content.len(),
            self.fingerprint()
        )
    }
}

/// A published message as it flows through matching, delivery, and queueing.
///
/// Fan-out shares one message across all matched subscribers behind an `Arc`;
/// the payload is never copied per delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Broker-assigned unique id for this publish.
    pub id: Uuid,
    /// Concrete topic the message was published on.
    pub topic: Topic,
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Identity of the publisher.
    pub source: EntityId,
    /// Whether the publisher requested durable queueing for absent
    /// subscribers.
    pub persist: bool,
    /// Broker clock at publish time, in unix milliseconds. Used as the
    /// retention horizon reference for durable entries.
    pub published_at: u64,
}
