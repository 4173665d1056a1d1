//! Spectcl: Expect-style automation of interactive programs
//!
//! Spectcl drives a child process the way TCL's `expect` does: output is
//! collected into a bounded buffer, and each call to [`Session::expect`]
//! registers a list of patterns, each with a handler. The first pattern found
//! in the buffer wins; if none is there yet, the expectation waits until new
//! output matches, the inactivity timeout passes, or the process reaches EOF.
//! Exactly one of those resolves it.
//!
//! # Features
//!
//! - **Async**: one background task per session, built on tokio
//! - **Pattern matching**: literal strings (Boyer-Moore-Horspool) and regular expressions
//! - **Sentinels**: [`Pattern::Eof`], [`Pattern::Timeout`] and [`Pattern::FullBuffer`]
//!   are ordinary patterns with handlers of their own
//! - **Re-arming**: a handler returning [`Flow::Continue`] evaluates the same list again
//!   (TCL's `exp_continue`)
//! - **Terminals**: children run on a pseudo-terminal, or on pipes
//! - **ANSI stripping**: optional removal of escape sequences before matching
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use spectcl::{ExpectError, Expectations, Flow, Pattern, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::builder()
//!         .timeout(Duration::from_secs(10))
//!         .spawn("ftp localhost")?;
//!
//!     let login = Expectations::new()
//!         .on(Pattern::regex("[Nn]ame")?, |session, _, done| {
//!             if let Err(e) = session.send_line("anonymous") {
//!                 done.fail(e);
//!                 return Flow::Complete;
//!             }
//!             Flow::Continue
//!         })
//!         .on("assword:", |session, _, _| {
//!             let _ = session.send_line("guest");
//!             Flow::Continue
//!         })
//!         .on("ftp> ", |_, m, done| {
//!             done.complete_with(m.before.clone());
//!             Flow::Complete
//!         })
//!         .on(Pattern::Timeout, |_, _, done| {
//!             done.fail(ExpectError::failed("login timed out"));
//!             Flow::Complete
//!         });
//!
//!     let banner = session.expect_async(login).await?;
//!     println!("Logged in: {banner:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Completion
//!
//! Every `expect` call has one final callback, wrapped in a [`Done`] handle that
//! each handler receives. Whatever happens across re-arms and nested `expect`
//! calls, it runs exactly once. A sentinel that fires without a registered
//! handler completes the chain with `Ok(None)`: timeouts and EOF are outcomes
//! for handlers to judge, not errors.
//!
//! # Testing without processes
//!
//! [`process::channel`] builds an in-memory transport whose [`process::Remote`]
//! end plays the child.

#![warn(missing_docs)]

mod buffer;
mod expectation;
mod pattern;
pub mod process;
mod result;
mod session;

// Public API exports
pub use expectation::{Arm, Expectations, Flow, Handler};
pub use pattern::Pattern;
pub use result::{ExpectError, ExpectOut, MatchResult, Outcome, PatternError};
pub use session::{Done, Session, SessionBuilder, SessionConfig, DEFAULT_MATCH_MAX, DEFAULT_TIMEOUT_MS};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
