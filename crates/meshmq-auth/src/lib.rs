//! # MeshMQ Auth Crate
//!
//! Every publish and subscribe is gated here. The [`AuthService`] checks a
//! decision cache first and only hands cache misses to the pluggable
//! [`ProofVerifier`]; concurrent requests for the same decision share a
//! single verification. A revocation feed can invalidate all cached verdicts
//! that depend on a proof through its fingerprint.
//!
//! Denials are opaque to callers: they see `AuthError::Denied` and nothing
//! else, while the detailed reason goes to the log.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::entities::{Grant, GrantClaim, Operation};
pub use domain::errors::{AuthError, VerifierError};
pub use ports::inbound::AuthorizationApi;
pub use ports::outbound::ProofVerifier;
pub use service::{AuthConfig, AuthService};
