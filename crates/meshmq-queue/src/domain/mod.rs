//! Domain types for the durable queue engine.

pub mod entities;
pub mod errors;
pub(crate) mod keys;
