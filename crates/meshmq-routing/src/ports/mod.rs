//! Hexagonal ports: the inbound routing API and the outbound peer gateway
//! the router drives for federation.

pub mod inbound;
pub mod outbound;
