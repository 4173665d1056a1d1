//! Session configuration

use portable_pty::PtySize;
use std::time::Duration;

/// Default inactivity timeout for expect operations (in milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default maximum buffer size (in characters)
pub const DEFAULT_MATCH_MAX: usize = 2000;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Immutable options of a session, fixed when it is created.
///
/// `timeout` and `match_max` drive the expectation engine. The remaining
/// fields are consumed by the process transport before output reaches the
/// buffer, and are ignored for sessions attached to a custom
/// [`Process`](crate::process::Process).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Maximum number of characters the buffer retains.
    pub match_max: usize,
    /// Remove ANSI escape sequences from output.
    pub strip_colors: bool,
    /// Lowercase output before it reaches the buffer.
    pub ignore_case: bool,
    /// Run the child on a pseudo-terminal instead of pipes.
    pub pty: bool,
    /// Terminal size when `pty` is set.
    pub pty_size: PtySize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            match_max: DEFAULT_MATCH_MAX,
            strip_colors: false,
            ignore_case: false,
            pty: true,
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}
