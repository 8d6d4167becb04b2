//! Authorization errors.

use thiserror::Error;

/// What callers of the authorization service can observe.
///
/// Denials never carry proof internals or verifier detail; those stay in the
/// log. The only distinction callers get is denied versus timed out, because
/// a timeout is retryable and a denial is not.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The operation is not authorized.
    #[error("authorization denied")]
    Denied,

    /// The verifier did not answer within the configured deadline. The
    /// verdict is unknown and nothing was cached.
    #[error("proof verification timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },
}

/// Errors a proof verifier reports to the service.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The proof does not authorize the requested operation. The reason is
    /// logged, never returned to the requester.
    #[error("proof rejected: {reason}")]
    Rejected { reason: String },

    /// The verifier could not do its work at all.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}
