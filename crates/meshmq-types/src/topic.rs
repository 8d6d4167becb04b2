//! # Topics and Subscription Patterns
//!
//! A topic is a `/`-separated path of non-empty segments, e.g.
//! `sensors/room1/temp`. The first segment is the topic's *namespace* and
//! decides which node is the designated router for durable delivery.
//!
//! A pattern is a topic where whole segments may be wildcards:
//!
//! - `+` matches exactly one segment in its position.
//! - `#` matches all remaining segments, including none, and is only valid
//!   as the final segment. `a/b/#` therefore matches `a/b` itself.
//!
//! The namespace segment of a pattern must be concrete so that every
//! subscription maps to exactly one namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Single-segment wildcard token.
pub const SINGLE_WILDCARD: &str = "+";

/// Trailing multi-segment wildcard token.
pub const MULTI_WILDCARD: &str = "#";

const SEPARATOR: char = '/';

/// A validated concrete topic.
///
/// Constructed only through [`Topic::parse`], so a held `Topic` is always
/// structurally valid and wildcard-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Parses and validates a concrete topic string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_segments(raw)?;
        for segment in raw.split(SEPARATOR) {
            if segment.contains(['+', '#']) {
                return Err(ValidationError::WildcardInTopic);
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// The topic as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the topic's segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// The first segment.
    pub fn namespace(&self) -> &str {
        // Parsing guarantees at least one non-empty segment.
        self.0.split(SEPARATOR).next().unwrap_or("")
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Topic::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// A validated subscription pattern.
///
/// Constructed only through [`Pattern::parse`]. A concrete topic string is
/// also a valid pattern that matches exactly itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(String);

impl Pattern {
    /// Parses and validates a pattern string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_segments(raw)?;
        let segments: Vec<&str> = raw.split(SEPARATOR).collect();
        for (index, segment) in segments.iter().enumerate() {
            let is_last = index == segments.len() - 1;
            match *segment {
                SINGLE_WILDCARD => {
                    if index == 0 {
                        return Err(ValidationError::WildcardNamespace);
                    }
                }
                MULTI_WILDCARD => {
                    if index == 0 {
                        return Err(ValidationError::WildcardNamespace);
                    }
                    if !is_last {
                        return Err(ValidationError::MultiWildcardNotLast);
                    }
                }
                other => {
                    if other.contains(['+', '#']) {
                        return Err(ValidationError::PartialWildcard {
                            segment: other.to_string(),
                        });
                    }
                }
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// The pattern as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the pattern's segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// The first segment, always concrete.
    pub fn namespace(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or("")
    }

    /// Whether this pattern matches the given concrete topic.
    ///
    /// `+` consumes exactly one topic segment. `#` consumes everything that
    /// remains, including nothing, so `a/b/#` matches `a/b`. Without a
    /// trailing `#` the pattern and topic must have the same segment count.
    pub fn matches(&self, topic: &Topic) -> bool {
        let topic_segments: Vec<&str> = topic.segments().collect();
        let pattern_segments: Vec<&str> = self.segments().collect();

        for (index, pattern_segment) in pattern_segments.iter().enumerate() {
            if *pattern_segment == MULTI_WILDCARD {
                return true;
            }
            match topic_segments.get(index) {
                None => return false,
                Some(topic_segment) => {
                    if *pattern_segment != SINGLE_WILDCARD && pattern_segment != topic_segment {
                        return false;
                    }
                }
            }
        }
        topic_segments.len() == pattern_segments.len()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pattern {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pattern::parse(&value)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.0
    }
}

fn validate_segments(raw: &str) -> Result<(), ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    if raw.split(SEPARATOR).any(str::is_empty) {
        return Err(ValidationError::EmptySegment);
    }
    Ok(())
}
