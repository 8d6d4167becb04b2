//! Cross-crate integration flows.

pub mod support;

pub mod authorization;
pub mod broker;
pub mod delivery;
pub mod durability;
