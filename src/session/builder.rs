//! Session builder for configuration

use super::config::SessionConfig;
use crate::process::{self, Process};
use crate::result::ExpectError;
use crate::session::Session;
use portable_pty::PtySize;
use std::time::Duration;

/// Builder for configuring and spawning sessions.
///
/// Provides a fluent interface for configuring session options before spawning a process.
///
/// # Defaults
///
/// - Timeout: 30 seconds of inactivity
/// - Buffer bound: 2000 characters
/// - ANSI stripping and case folding: disabled
/// - Pseudo-terminal of 24 rows × 80 columns
///
/// # Examples
///
/// ```no_run
/// use spectcl::Session;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(60))
///     .match_max(10_000)
///     .strip_colors(true)
///     .pty_size(40, 120)
///     .spawn("python3 -i")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    ///
    /// See the [`SessionBuilder`] documentation for default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inactivity timeout.
    ///
    /// A pending expectation resolves with [`Pattern::Timeout`](crate::Pattern::Timeout)
    /// once this long has passed without a match or any new output.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable the timeout (wait indefinitely).
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the buffer bound in characters.
    ///
    /// When output exceeds it, the oldest characters are dropped and
    /// [`Pattern::FullBuffer`](crate::Pattern::FullBuffer) becomes matchable.
    pub fn match_max(mut self, chars: usize) -> Self {
        self.config.match_max = chars;
        self
    }

    /// Enable or disable ANSI escape sequence stripping.
    pub fn strip_colors(mut self, strip: bool) -> Self {
        self.config.strip_colors = strip;
        self
    }

    /// Lowercase output before matching.
    ///
    /// Patterns are not folded; write them in lowercase.
    pub fn ignore_case(mut self, fold: bool) -> Self {
        self.config.ignore_case = fold;
        self
    }

    /// Run the child on a pseudo-terminal (default) or on plain pipes.
    pub fn pty(mut self, pty: bool) -> Self {
        self.config.pty = pty;
        self
    }

    /// Set PTY (terminal) size.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spectcl::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .pty_size(40, 120)  // Larger terminal
    ///     .spawn("vi")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.config.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Spawn a command line, split on whitespace.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command string is empty
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    pub fn spawn(self, command: &str) -> Result<Session, ExpectError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ExpectError::SpawnError("Empty command".to_string()))?;
        let args: Vec<String> = parts.map(str::to_owned).collect();
        self.spawn_program(program, &args)
    }

    /// Spawn `program` with an explicit argument list.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_program(self, program: &str, args: &[String]) -> Result<Session, ExpectError> {
        if program.is_empty() {
            return Err(ExpectError::SpawnError("Empty command".to_string()));
        }
        let process = process::spawn(program, args, &self.config)?;
        Ok(Session::attach(process, self.config))
    }

    /// Run a session over an existing transport, such as one from
    /// [`process::channel`](crate::process::channel).
    ///
    /// `strip_colors`, `ignore_case` and the terminal options do not apply:
    /// the transport delivers output as is. Must be called from within a
    /// Tokio runtime.
    pub fn attach(self, process: Process) -> Session {
        Session::attach(process, self.config)
    }
}
