//! Validation errors for broker-facing requests.

use thiserror::Error;

/// Rejection of a malformed topic, pattern, or identity.
///
/// Validation happens before authorization, so none of these variants carry
/// any information derived from proofs or grants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The topic or pattern string was empty.
    #[error("topic must contain at least one segment")]
    EmptyTopic,

    /// A segment between two separators was empty (leading, trailing, or
    /// doubled `/`).
    #[error("topic segments must be non-empty")]
    EmptySegment,

    /// A concrete topic contained a wildcard character.
    #[error("wildcards are not allowed in a concrete topic")]
    WildcardInTopic,

    /// A wildcard character appeared inside a longer segment, e.g. `a/b+/c`.
    /// Wildcards must occupy a whole segment.
    #[error("wildcard must occupy a whole segment, found {segment:?}")]
    PartialWildcard {
        /// The offending segment.
        segment: String,
    },

    /// The multi-segment wildcard `#` appeared before the final segment.
    #[error("multi-segment wildcard is only valid as the final segment")]
    MultiWildcardNotLast,

    /// The first segment of a pattern was a wildcard. Routing requires a
    /// concrete namespace to decide designated-router responsibility.
    #[error("pattern namespace segment must be concrete")]
    WildcardNamespace,

    /// An identity string could not be decoded.
    #[error("invalid identity: {reason}")]
    InvalidIdentity {
        /// Why decoding failed.
        reason: String,
    },
}
