//! Pattern matching for expect operations

mod matcher;
mod scan;

pub(crate) use scan::{scan, CompiledPattern};

use crate::result::PatternError;
use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};

/// What an expectation watches for.
///
/// Content patterns (`Literal`, `Regex`) are matched against the session's
/// buffer. The sentinels (`Eof`, `Timeout`, `FullBuffer`) are matched by
/// session events instead: the child closing its output, the inactivity timer
/// expiring, or the buffer overflowing its bound.
///
/// Two patterns are equal when they would match the same thing: literals by
/// text, regexes by source, sentinels by variant. Expectation lists use this
/// equality to keep only the first handler registered for a pattern.
///
/// # Examples
///
/// ```
/// use spectcl::Pattern;
///
/// let prompt = Pattern::literal("$ ");
/// let digits = Pattern::regex(r"\d+").unwrap();
/// let eof = Pattern::Eof;
///
/// assert_eq!(prompt, Pattern::from("$ "));
/// assert_ne!(digits, Pattern::literal(r"\d+"));
/// assert!(eof.is_sentinel());
/// ```
#[derive(Clone)]
pub enum Pattern {
    /// Exact substring; the leftmost occurrence wins.
    Literal(String),

    /// Regular expression; the first match in the buffer wins.
    ///
    /// The matched text and all capture groups are returned in the
    /// [`MatchResult`](crate::MatchResult).
    Regex(Regex),

    /// Matches when the process closes its output.
    Eof,

    /// Matches when no match (and no data) arrived for the configured timeout.
    Timeout,

    /// Matches when the buffer overflowed its bound since the last match.
    FullBuffer,
}

impl Pattern {
    /// Create a literal pattern.
    pub fn literal(s: impl Into<String>) -> Self {
        Pattern::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] if the pattern does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectcl::Pattern;
    ///
    /// let pattern = Pattern::regex(r"(?i)password:").unwrap();
    /// assert!(Pattern::regex(r"(unclosed").is_err());
    /// ```
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Check if this is a sentinel pattern (EOF, Timeout, FullBuffer)
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Pattern::Eof | Pattern::Timeout | Pattern::FullBuffer)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Literal(a), Pattern::Literal(b)) => a == b,
            (Pattern::Regex(a), Pattern::Regex(b)) => a.as_str() == b.as_str(),
            (Pattern::Eof, Pattern::Eof)
            | (Pattern::Timeout, Pattern::Timeout)
            | (Pattern::FullBuffer, Pattern::FullBuffer) => true,
            _ => false,
        }
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Pattern::Literal(s) => s.hash(state),
            Pattern::Regex(r) => r.as_str().hash(state),
            Pattern::Eof | Pattern::Timeout | Pattern::FullBuffer => {}
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "Literal({s:?})"),
            Pattern::Regex(r) => write!(f, "Regex({:?})", r.as_str()),
            Pattern::Eof => f.write_str("Eof"),
            Pattern::Timeout => f.write_str("Timeout"),
            Pattern::FullBuffer => f.write_str("FullBuffer"),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "{s:?}"),
            Pattern::Regex(r) => write!(f, "/{}/", r.as_str()),
            Pattern::Eof => f.write_str("EOF"),
            Pattern::Timeout => f.write_str("TIMEOUT"),
            Pattern::FullBuffer => f.write_str("FULL_BUFFER"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Literal(s.to_owned())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Literal(s)
    }
}

impl From<Regex> for Pattern {
    fn from(r: Regex) -> Self {
        Pattern::Regex(r)
    }
}
