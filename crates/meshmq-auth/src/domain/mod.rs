//! Authorization domain: verdicts, cache keys, and the decision cache.

pub(crate) mod cache;
pub mod entities;
pub mod errors;
