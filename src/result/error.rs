//! Error types for spectcl

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during expect operations.
///
/// Two families live here. Validation and in-progress errors are returned
/// synchronously from [`Session::expect`](crate::Session::expect) and mean the
/// expectation round never started. `Timeout`, `Eof` and `FullBuffer` are never
/// produced by the session itself: they exist so handlers can report those
/// sentinel outcomes as failures through [`Done::fail`](crate::Done::fail).
///
/// # Examples
///
/// ```no_run
/// use spectcl::{ExpectError, Expectations, Flow, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("some-command")?;
///
/// let list = Expectations::new()
///     .on("done", |_, _, _| Flow::Complete)
///     .on(Pattern::Timeout, |session, _, done| {
///         let duration = session.config().timeout.unwrap_or_default();
///         done.fail(ExpectError::Timeout { duration });
///         Flow::Complete
///     });
///
/// match session.expect_async(list).await {
///     Ok(_) => println!("finished"),
///     Err(ExpectError::Timeout { duration }) => eprintln!("Timed out after {:?}", duration),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// The expectation list was empty or did not consist of pattern/handler pairs.
    #[error("Invalid expectation list: {reason}")]
    InvalidExpectationList {
        /// Why the list was rejected
        reason: &'static str,
    },

    /// An entry in a pattern position is not a usable pattern.
    #[error("Invalid pattern at position {index}: {source}")]
    InvalidPattern {
        /// Position of the entry in the flat expectation list
        index: usize,
        /// What was wrong with it
        #[source]
        source: PatternError,
    },

    /// An entry in a handler position is not a handler.
    #[error("Expected a handler at position {index}")]
    InvalidHandler {
        /// Position of the entry in the flat expectation list
        index: usize,
    },

    /// `expect` was called while another expectation is pending on the session.
    ///
    /// The new call is rejected; the pending expectation is unaffected.
    #[error("Only one expectation can be evaluated at a time")]
    ExpectationInProgress,

    /// Timeout waiting for pattern.
    #[error("Timeout waiting for pattern (after {duration:?})")]
    Timeout {
        /// Duration that was waited before timeout
        duration: Duration,
    },

    /// EOF reached before pattern matched.
    #[error("EOF reached before pattern matched")]
    Eof,

    /// Buffer overflowed before pattern matched.
    #[error("Buffer full ({size} characters)")]
    FullBuffer {
        /// Number of characters retained when the buffer overflowed
        size: usize,
    },

    /// A handler failed the expectation with its own message.
    #[error("{0}")]
    Failed(String),

    /// Invalid pattern.
    ///
    /// Returned when creating a pattern with invalid syntax (e.g., invalid regex).
    #[error("Invalid pattern: {0}")]
    PatternError(#[from] PatternError),

    /// I/O error.
    ///
    /// Returned when an underlying I/O operation fails (reading from PTY, writing
    /// to PTY, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// PTY error.
    ///
    /// Returned when PTY creation or manipulation fails.
    #[error("PTY error: {0}")]
    PtyError(String),

    /// Process spawning error.
    ///
    /// Returned when the specified command cannot be spawned (command not found,
    /// permission denied, etc.).
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    /// Process already exited.
    ///
    /// Returned when the child handle is gone (already waited on, or the
    /// session was attached to a transport without one) or its input is closed.
    #[error("Process has already exited")]
    ProcessExited,

    /// The session was dropped before the expectation completed.
    #[error("Session closed before the expectation completed")]
    SessionClosed,
}

impl ExpectError {
    /// Build a [`ExpectError::Failed`] from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        ExpectError::Failed(message.into())
    }
}

/// Errors related to pattern creation or validation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    ///
    /// Returned when `Pattern::regex()` is called with invalid regex syntax.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// A handler was found where a pattern was expected.
    #[error("expected a string, regex or sentinel pattern, found a handler")]
    NotAPattern,
}
