//! # Listener patterns.
//!
//! A [`Pattern`] is compiled once at registration time into its literal
//! segments plus a trailing-wildcard flag:
//!
//! | pattern       | matches                                   |
//! |---------------|-------------------------------------------|
//! | `form.submit` | exactly `form.submit`                     |
//! | `form.*`      | `form.submit`, `form.start`, `form.a.b`   |
//! | `*`           | every event                               |
//!
//! `*` is only allowed as the last segment. A wildcard needs at least one
//! segment in its place, so `form.*` does not match `form`.

use std::fmt;
use std::sync::Arc;

use crate::error::EmitError;

const WILDCARD: &str = "*";

/// Compiled event-name pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    raw: Arc<str>,
    prefix: Vec<Box<str>>,
    wildcard: bool,
}

impl Pattern {
    /// Parses and validates a pattern.
    ///
    /// # Example
    /// ```
    /// use eventvisor::Pattern;
    ///
    /// let p = Pattern::parse("form.*").unwrap();
    /// assert!(p.matches("form.submit"));
    /// assert!(!p.matches("form"));
    /// assert!(Pattern::parse("*.submit").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, EmitError> {
        let invalid = |reason| EmitError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("empty pattern"));
        }

        let mut segments: Vec<&str> = raw.split('.').collect();
        let wildcard = segments.last() == Some(&WILDCARD);
        if wildcard {
            segments.pop();
        }

        let mut prefix = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment == WILDCARD {
                return Err(invalid("`*` is only allowed as the last segment"));
            }
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(invalid("segments may only contain [A-Za-z0-9_-]"));
            }
            prefix.push(Box::from(segment));
        }

        Ok(Self {
            raw: Arc::from(raw),
            prefix,
            wildcard,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Literal segments before the wildcard (or all segments for an exact pattern).
    pub(crate) fn prefix(&self) -> &[Box<str>] {
        &self.prefix
    }

    /// Direct match against a name; the registry uses its trie instead.
    pub fn matches(&self, name: &str) -> bool {
        let mut segments = name.split('.');
        for literal in &self.prefix {
            match segments.next() {
                Some(s) if s == &**literal => {}
                _ => return false,
            }
        }
        let rest = segments.count();
        if self.wildcard { rest >= 1 } else { rest == 0 }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
