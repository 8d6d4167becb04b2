//! Hexagonal ports: the inbound API the broker calls and the outbound
//! verifier the service drives.

pub mod inbound;
pub mod outbound;
