//! # Subscription Trie
//!
//! Pattern index keyed by segment. Each node holds the subscriptions whose
//! pattern ends there, with wildcard tokens (`+`, `#`) as ordinary child
//! keys. Matching a topic walks concrete and `+` branches in parallel and
//! collects `#` branches at every level, so `a/b/#` is found for the topic
//! `a/b` itself.
//!
//! Matching takes the index read lock and runs concurrently across
//! publishers; only subscribe, unsubscribe, and the sweep take the write
//! lock. Expired subscriptions are filtered at match time, so a subscription
//! the sweep has not reached yet still never matches.

use std::collections::HashMap;

use meshmq_types::{EntityId, Pattern, Topic, MULTI_WILDCARD, SINGLE_WILDCARD};
use parking_lot::RwLock;

use crate::domain::entities::Subscription;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// Subscriptions whose pattern ends at this node, by subscriber.
    subscriptions: HashMap<EntityId, Subscription>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.subscriptions.is_empty()
    }
}

/// Concurrent wildcard subscription index.
#[derive(Debug, Default)]
pub(crate) struct PatternTrie {
    root: RwLock<TrieNode>,
}

impl PatternTrie {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds or refreshes a subscription. Returns the replaced record when
    /// the `(subscriber, pattern)` pair already existed.
    pub(crate) fn insert(&self, subscription: Subscription) -> Option<Subscription> {
        let segments: Vec<String> = subscription
            .pattern
            .segments()
            .map(str::to_string)
            .collect();
        let mut root = self.root.write();
        let mut node = &mut *root;
        for segment in segments {
            node = node.children.entry(segment).or_default();
        }
        node.subscriptions
            .insert(subscription.subscriber, subscription)
    }

    /// Looks up one subscription without touching expiry.
    pub(crate) fn get(&self, subscriber: &EntityId, pattern: &Pattern) -> Option<Subscription> {
        let root = self.root.read();
        let mut node = &*root;
        for segment in pattern.segments() {
            node = node.children.get(segment)?;
        }
        node.subscriptions.get(subscriber).cloned()
    }

    /// Removes one subscription, pruning nodes left empty along the path.
    pub(crate) fn remove(
        &self,
        subscriber: &EntityId,
        pattern: &Pattern,
    ) -> Option<Subscription> {
        let segments: Vec<&str> = pattern.segments().collect();
        let mut root = self.root.write();
        remove_at(&mut root, &segments, subscriber, None)
    }

    /// Removes one subscription only if it is expired at `now`. The check
    /// runs under the same write lock as the removal, so a racing refresh
    /// cannot be lost.
    pub(crate) fn remove_if_expired(
        &self,
        subscriber: &EntityId,
        pattern: &Pattern,
        now: u64,
    ) -> Option<Subscription> {
        let segments: Vec<&str> = pattern.segments().collect();
        let mut root = self.root.write();
        remove_at(&mut root, &segments, subscriber, Some(now))
    }

    /// All live subscriptions matching `topic`, one per `(subscriber,
    /// pattern)` pair. A subscriber holding several matching patterns
    /// appears once per pattern.
    pub(crate) fn matches(&self, topic: &Topic, now: u64) -> Vec<Subscription> {
        let segments: Vec<&str> = topic.segments().collect();
        let root = self.root.read();
        let mut out = Vec::new();
        collect_matches(&root, &segments, now, &mut out);
        out
    }

    /// Snapshot of every subscription whose expiry has passed.
    pub(crate) fn expired(&self, now: u64) -> Vec<Subscription> {
        let root = self.root.read();
        let mut out = Vec::new();
        collect_expired(&root, now, &mut out);
        out
    }

    /// Whether the subscriber holds at least one unexpired subscription.
    pub(crate) fn has_live(&self, subscriber: &EntityId, now: u64) -> bool {
        let root = self.root.read();
        has_live(&root, subscriber, now)
    }

    /// Total records held, live and expired.
    pub(crate) fn subscription_count(&self) -> usize {
        let root = self.root.read();
        count(&root)
    }
}

/// Removes `subscriber`'s record at the end of `segments`, pruning empty
/// nodes on the way back up. With `expired_at` set, removal only happens if
/// the record's expiry has passed.
fn remove_at(
    node: &mut TrieNode,
    segments: &[&str],
    subscriber: &EntityId,
    expired_at: Option<u64>,
) -> Option<Subscription> {
    let Some((head, rest)) = segments.split_first() else {
        if let Some(now) = expired_at {
            let live = node
                .subscriptions
                .get(subscriber)
                .is_some_and(|s| s.expires_at > now);
            if live {
                return None;
            }
        }
        return node.subscriptions.remove(subscriber);
    };

    let child = node.children.get_mut(*head)?;
    let removed = remove_at(child, rest, subscriber, expired_at);
    if removed.is_some() && child.is_empty() {
        node.children.remove(*head);
    }
    removed
}

fn collect_matches(node: &TrieNode, remaining: &[&str], now: u64, out: &mut Vec<Subscription>) {
    // A `#` child matches whatever remains, including nothing.
    if let Some(rest) = node.children.get(MULTI_WILDCARD) {
        collect_live(rest, now, out);
    }
    match remaining.split_first() {
        None => collect_live(node, now, out),
        Some((head, rest)) => {
            if let Some(child) = node.children.get(*head) {
                collect_matches(child, rest, now, out);
            }
            if let Some(child) = node.children.get(SINGLE_WILDCARD) {
                collect_matches(child, rest, now, out);
            }
        }
    }
}

fn collect_live(node: &TrieNode, now: u64, out: &mut Vec<Subscription>) {
    out.extend(
        node.subscriptions
            .values()
            .filter(|s| s.expires_at > now)
            .cloned(),
    );
}

fn collect_expired(node: &TrieNode, now: u64, out: &mut Vec<Subscription>) {
    out.extend(
        node.subscriptions
            .values()
            .filter(|s| s.expires_at <= now)
            .cloned(),
    );
    for child in node.children.values() {
        collect_expired(child, now, out);
    }
}

fn has_live(node: &TrieNode, subscriber: &EntityId, now: u64) -> bool {
    if node
        .subscriptions
        .get(subscriber)
        .is_some_and(|s| s.expires_at > now)
    {
        return true;
    }
    node.children
        .values()
        .any(|child| has_live(child, subscriber, now))
}

fn count(node: &TrieNode) -> usize {
    node.subscriptions.len() + node.children.values().map(count).sum::<usize>()
}
