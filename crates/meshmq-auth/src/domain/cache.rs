//! # Decision Cache
//!
//! Bounded in-memory cache of authorization verdicts with a reverse index by
//! proof fingerprint.
//!
//! ## Invariants
//!
//! - **I. Mirrored**: every key in `entries` appears in exactly one
//!   fingerprint bucket, and every bucket member exists in `entries`. All
//!   mutation goes through helpers that maintain both sides.
//! - **II. Expiry-honoring**: `lookup` never returns a decision whose expiry
//!   has passed, regardless of when the sweep last ran.
//! - **III. Bounded**: `entries` never exceeds the configured capacity;
//!   inserting into a full cache first drops expired decisions, then the
//!   decision closest to expiry.

use std::collections::{HashMap, HashSet};

use meshmq_types::ProofFingerprint;
use parking_lot::RwLock;

use crate::domain::entities::{CacheKey, CachedDecision, Decision};

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CachedDecision>,
    by_fingerprint: HashMap<ProofFingerprint, HashSet<CacheKey>>,
}

#[derive(Debug)]
pub(crate) struct DecisionCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

impl DecisionCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Returns the cached decision for `key` if it has not expired.
    pub(crate) fn lookup(&self, key: &CacheKey, now: u64) -> Option<Decision> {
        let inner = self.inner.read();
        let cached = inner.entries.get(key)?;
        if cached.expires_at <= now {
            return None;
        }
        Some(cached.decision.clone())
    }

    /// Caches a decision, evicting if the cache is full.
    pub(crate) fn insert(&self, key: CacheKey, decision: Decision, expires_at: u64, now: u64) {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            Self::make_room(&mut inner, now);
        }
        Self::unlink(&mut inner, &key);
        inner
            .by_fingerprint
            .entry(key.fingerprint)
            .or_default()
            .insert(key.clone());
        inner.entries.insert(
            key,
            CachedDecision {
                decision,
                expires_at,
            },
        );
    }

    /// Drops every decision that was made from the given proof. Returns how
    /// many were removed.
    pub(crate) fn invalidate(&self, fingerprint: &ProofFingerprint) -> usize {
        let mut inner = self.inner.write();
        let Some(keys) = inner.by_fingerprint.remove(fingerprint) else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            if inner.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Frees at least one slot: first drops all expired decisions, then the
    /// live decision closest to expiry.
    fn make_room(inner: &mut CacheInner, now: u64) {
        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, cached)| cached.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            Self::unlink(inner, key);
        }
        if !expired.is_empty() {
            return;
        }

        let soonest = inner
            .entries
            .iter()
            .min_by_key(|(_, cached)| cached.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = soonest {
            Self::unlink(inner, &key);
        }
    }

    /// Removes one key from both maps.
    fn unlink(inner: &mut CacheInner, key: &CacheKey) {
        if inner.entries.remove(key).is_some() {
            if let Some(bucket) = inner.by_fingerprint.get_mut(&key.fingerprint) {
                bucket.remove(key);
                if bucket.is_empty() {
                    inner.by_fingerprint.remove(&key.fingerprint);
                }
            }
        }
    }
}
