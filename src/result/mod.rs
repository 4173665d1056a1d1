//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

use crate::pattern::Pattern;

/// Final result of an expectation chain, as delivered to the completion callback.
///
/// `Ok(Some(value))` carries whatever a handler passed to
/// [`Done::complete_with`](crate::Done::complete_with); `Ok(None)` is a plain
/// completion, including a sentinel that fired with no handler registered.
pub type Outcome = Result<Option<String>, ExpectError>;

/// A resolved expectation: which pattern fired and what it consumed.
///
/// # Examples
///
/// ```no_run
/// use spectcl::{Expectations, Flow, Pattern, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::spawn("echo user@example.com")?;
/// let email = Pattern::regex(r"(\w+)@(\w+)\.(\w+)")?;
/// let list = Expectations::new().on(email, |_, m, done| {
///     // captures[0] is the full match
///     println!("User: {}", m.captures[1]);
///     done.complete_with(m.captures[2].clone());
///     Flow::Complete
/// });
///
/// let domain = session.expect_async(list).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The pattern that resolved the expectation.
    ///
    /// For sentinel outcomes this is [`Pattern::Eof`], [`Pattern::Timeout`] or
    /// [`Pattern::FullBuffer`].
    pub pattern: Pattern,

    /// The matched text.
    ///
    /// Empty for `Eof` and `Timeout`; the whole retained buffer for `FullBuffer`.
    pub matched: String,

    /// Start of the match within the buffer at match time (byte offset).
    pub start: usize,

    /// End of the match within the buffer at match time (byte offset).
    pub end: usize,

    /// Text that appeared before the match.
    pub before: String,

    /// Captured groups (for regex patterns).
    ///
    /// Index 0 is the full match; groups that did not participate are empty
    /// strings so indices stay aligned. Empty for non-regex patterns.
    pub captures: Vec<String>,

    /// The flushed buffer: everything consumed by this match (`before` + `matched`).
    ///
    /// For `Timeout` nothing is consumed and this is empty.
    pub buffer: String,
}

impl MatchResult {
    /// A literal or regex hit spanning `start..end` of a flushed prefix.
    pub(crate) fn hit(pattern: Pattern, flushed: String, start: usize, captures: Vec<String>) -> Self {
        let end = flushed.len();
        Self {
            pattern,
            matched: flushed[start..].to_owned(),
            start,
            end,
            before: flushed[..start].to_owned(),
            captures,
            buffer: flushed,
        }
    }

    /// The whole retained buffer, consumed by `FullBuffer`.
    pub(crate) fn full_buffer(flushed: String) -> Self {
        Self {
            pattern: Pattern::FullBuffer,
            matched: flushed.clone(),
            start: 0,
            end: flushed.len(),
            before: String::new(),
            captures: vec![],
            buffer: flushed,
        }
    }

    /// End of stream; the remaining buffer is flushed.
    pub(crate) fn eof(flushed: String) -> Self {
        let end = flushed.len();
        Self {
            pattern: Pattern::Eof,
            matched: String::new(),
            start: end,
            end,
            before: flushed.clone(),
            captures: vec![],
            buffer: flushed,
        }
    }

    /// Inactivity timeout; nothing is consumed, `before` shows what was pending.
    pub(crate) fn timeout(pending: &str) -> Self {
        Self {
            pattern: Pattern::Timeout,
            matched: String::new(),
            start: pending.len(),
            end: pending.len(),
            before: pending.to_owned(),
            captures: vec![],
            buffer: String::new(),
        }
    }

    /// Whether this result came from one of the sentinel patterns.
    pub fn is_sentinel(&self) -> bool {
        self.pattern.is_sentinel()
    }
}

/// Inspectable record of the most recent resolution, in the manner of TCL's
/// `expect_out` array.
#[derive(Debug, Clone, Default)]
pub struct ExpectOut {
    /// Text flushed by the most recent match, EOF or full-buffer resolution.
    pub buffer: String,

    /// The most recent resolution of any kind, including timeouts.
    pub matched: Option<MatchResult>,
}

impl ExpectOut {
    pub(crate) fn record(&mut self, result: &MatchResult) {
        if result.pattern != Pattern::Timeout {
            self.buffer = result.buffer.clone();
        }
        self.matched = Some(result.clone());
    }
}
