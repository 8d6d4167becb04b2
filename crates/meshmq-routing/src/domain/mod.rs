//! Routing domain: subscriptions, request/receipt types, storage keys, and
//! the pattern trie.

pub mod entities;
pub mod errors;
pub(crate) mod keys;
pub(crate) mod trie;
