//! Session management: a child process and the expectation engine watching it

mod builder;
mod config;
mod done;
mod driver;

pub use builder::SessionBuilder;
pub use config::{SessionConfig, DEFAULT_MATCH_MAX, DEFAULT_TIMEOUT_MS};
pub use done::Done;

use crate::buffer::MatchBuffer;
use crate::expectation::{ExpectationSet, Expectations, Flow};
use crate::pattern::scan;
use crate::process::{Input, Process, ProcessChild};
use crate::result::{ExpectError, ExpectOut, MatchResult, Outcome};
use portable_pty::ExitStatus;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Chunks kept for slow [`Session::subscribe_output`] receivers
const OUTPUT_CAPACITY: usize = 256;

/// Handle to a running process and its expectation engine.
///
/// A `Session` is a cheap, cloneable handle. Output of the child is collected
/// into a bounded buffer by a background task; [`expect`](Session::expect)
/// registers a list of patterns with handlers and resolves it exactly once by
/// a match, the inactivity timeout, or EOF. At most one expectation is pending
/// per session.
///
/// # Examples
///
/// ```no_run
/// use spectcl::{Expectations, Flow, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(10))
///     .spawn("python3 -i")?;
///
/// session
///     .expect_async(Expectations::new().on(">>> ", |session, _, done| {
///         if let Err(e) = session.send_line("print('Hello')") {
///             done.fail(e);
///         }
///         Flow::Complete
///     }))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: SessionConfig,
    state: Mutex<State>,
    wake: Arc<Notify>,
    input: mpsc::UnboundedSender<Input>,
    child: Mutex<Option<Box<dyn ProcessChild>>>,
    output: broadcast::Sender<String>,
}

struct State {
    buffer: MatchBuffer,
    expect_out: ExpectOut,
    phase: Phase,
    eof: bool,
}

enum Phase {
    Idle,
    Expecting(Pending),
}

/// The one in-flight expectation of a session.
struct Pending {
    set: Arc<ExpectationSet>,
    done: Done,
    timer: Option<Timer>,
}

/// Inactivity deadline of a pending expectation.
struct Timer {
    period: Duration,
    deadline: Instant,
}

impl Timer {
    fn start(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now() + period,
        }
    }

    fn restart(&mut self) {
        self.deadline = Instant::now() + self.period;
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// A pending expectation taken out of the session, ready for its handler.
struct Resolution {
    set: Arc<ExpectationSet>,
    done: Done,
    result: MatchResult,
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Caller,
    Continue,
}

impl State {
    fn new(match_max: usize) -> Self {
        Self {
            buffer: MatchBuffer::new(match_max),
            expect_out: ExpectOut::default(),
            phase: Phase::Idle,
            eof: false,
        }
    }

    fn is_expecting(&self) -> bool {
        matches!(self.phase, Phase::Expecting(_))
    }

    fn take_pending(&mut self) -> Option<Pending> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Expecting(pending) => Some(pending),
            Phase::Idle => None,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Expecting(Pending {
                timer: Some(timer), ..
            }) => Some(timer.deadline),
            _ => None,
        }
    }

    fn record(&mut self, result: MatchResult) -> MatchResult {
        self.expect_out.record(&result);
        result
    }

    fn flush_eof(&mut self) -> MatchResult {
        let flushed = self.buffer.take_all();
        self.record(MatchResult::eof(flushed))
    }

    fn feed(&mut self, chunk: &str) -> Option<Resolution> {
        if self.buffer.append(chunk) {
            debug!(match_max = self.buffer.max_chars(), "buffer full, oldest output dropped");
        }

        let Phase::Expecting(pending) = &mut self.phase else {
            return None;
        };
        match scan(&mut self.buffer, pending.set.patterns()) {
            None => {
                if let Some(timer) = &mut pending.timer {
                    timer.restart();
                }
                None
            }
            Some(result) => {
                let result = self.record(result);
                let Pending { set, done, .. } = self.take_pending()?;
                Some(Resolution { set, done, result })
            }
        }
    }

    fn expire(&mut self) -> Option<Resolution> {
        let Phase::Expecting(pending) = &self.phase else {
            return None;
        };
        if !pending.timer.as_ref().is_some_and(Timer::expired) {
            return None;
        }
        let Pending { set, done, .. } = self.take_pending()?;
        let result = self.record(MatchResult::timeout(self.buffer.snapshot()));
        Some(Resolution { set, done, result })
    }

    fn close(&mut self) -> Option<Resolution> {
        self.eof = true;
        let Pending { set, done, .. } = self.take_pending()?;
        let result = self.flush_eof();
        Some(Resolution { set, done, result })
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.wake.notify_one();
        let pending = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take_pending();
        if let Some(pending) = pending {
            debug!("session dropped with a pending expectation");
            pending.done.fail(ExpectError::SessionClosed);
        }
    }
}

impl Session {
    /// Create a new session builder.
    ///
    /// This is the recommended way to create a session as it allows you to configure
    /// options like the timeout, buffer bound and terminal.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command with the default configuration.
    ///
    /// Shorthand for `Session::builder().spawn(command)`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spectcl::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("echo Hello")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(command: &str) -> Result<Self, ExpectError> {
        SessionBuilder::new().spawn(command)
    }

    /// Start the engine on `process`. Must run inside a Tokio runtime.
    pub(crate) fn attach(process: Process, config: SessionConfig) -> Self {
        let Process {
            events,
            input,
            child,
        } = process;
        let wake = Arc::new(Notify::new());
        let (output, _) = broadcast::channel(OUTPUT_CAPACITY);

        let shared = Arc::new(Shared {
            state: Mutex::new(State::new(config.match_max)),
            config,
            wake: wake.clone(),
            input,
            child: Mutex::new(child),
            output,
        });
        tokio::spawn(driver::drive(Arc::downgrade(&shared), wake, events));

        Session { shared }
    }

    pub(crate) fn upgrade(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Session { shared })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an expectation list.
    ///
    /// The buffer is scanned right away; a pattern already present resolves
    /// synchronously, before this call returns. Otherwise the expectation stays
    /// pending until output matches, the inactivity timeout passes, or the
    /// process reaches EOF. `on_done` runs exactly once for the whole chain,
    /// including every [`Flow::Continue`] re-arm.
    ///
    /// # Errors
    ///
    /// Returns an error, and never calls `on_done`, if:
    /// - the list is empty, has odd length, or holds a misplaced or invalid entry
    /// - another expectation is already pending ([`ExpectError::ExpectationInProgress`])
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spectcl::{Expectations, Flow, Pattern, Session};
    ///
    /// # fn example(session: Session) -> Result<(), Box<dyn std::error::Error>> {
    /// let list = Expectations::new()
    ///     .on(Pattern::regex("user:?")?, |session, _, _| {
    ///         let _ = session.send_line("admin");
    ///         Flow::Continue
    ///     })
    ///     .on("assword", |_, m, done| {
    ///         done.complete_with(m.buffer.clone());
    ///         Flow::Complete
    ///     })
    ///     .on(Pattern::Timeout, |_, _, done| {
    ///         done.fail(spectcl::ExpectError::failed("no login prompt"));
    ///         Flow::Complete
    ///     });
    ///
    /// session.expect(list, |outcome| println!("login: {outcome:?}"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn expect<F>(&self, list: impl Into<Expectations>, on_done: F) -> Result<(), ExpectError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let set = ExpectationSet::build(list.into())?;
        debug!(patterns = %set.describe(), "expect");
        self.arm(Arc::new(set), Done::new(on_done), Origin::Caller)
    }

    /// Register an expectation list and wait for its final outcome.
    ///
    /// Validation and in-progress errors are returned as `Err` as well.
    pub async fn expect_async(&self, list: impl Into<Expectations>) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.expect(list, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        rx.await.unwrap_or(Err(ExpectError::SessionClosed))
    }

    fn arm(&self, mut set: Arc<ExpectationSet>, mut done: Done, mut origin: Origin) -> Result<(), ExpectError> {
        loop {
            let resolution = {
                let mut state = self.state();
                if state.is_expecting() {
                    drop(state);
                    return match origin {
                        Origin::Caller => {
                            done.defuse();
                            Err(ExpectError::ExpectationInProgress)
                        }
                        Origin::Continue => {
                            warn!("cannot continue, another expectation is pending");
                            done.fail(ExpectError::ExpectationInProgress);
                            Ok(())
                        }
                    };
                }

                let result = match scan(&mut state.buffer, set.patterns()) {
                    Some(result) => state.record(result),
                    None if state.eof => state.flush_eof(),
                    None => {
                        state.phase = Phase::Expecting(Pending {
                            set,
                            done,
                            timer: self.shared.config.timeout.map(Timer::start),
                        });
                        drop(state);
                        trace!(?origin, "expectation pending");
                        self.shared.wake.notify_one();
                        return Ok(());
                    }
                };
                Resolution { set, done, result }
            };

            match self.dispatch(resolution) {
                Some((next_set, next_done)) => {
                    set = next_set;
                    done = next_done;
                    origin = Origin::Continue;
                }
                None => return Ok(()),
            }
        }
    }

    /// Run the handler of a resolved expectation.
    ///
    /// Returns the list and completion handle to re-arm on `Flow::Continue`.
    fn dispatch(&self, resolution: Resolution) -> Option<(Arc<ExpectationSet>, Done)> {
        let Resolution { set, done, result } = resolution;
        debug!(pattern = %result.pattern, flushed = result.buffer.len(), "expectation resolved");

        let Some(handler) = set.handler_for(&result.pattern) else {
            trace!(pattern = %result.pattern, "no handler registered, completing");
            done.complete();
            return None;
        };

        match handler.call(self, &result, done.clone()) {
            Flow::Complete => None,
            Flow::Continue if done.is_finished() => {
                warn!("handler returned Continue after completing the expectation");
                None
            }
            Flow::Continue => {
                trace!("re-arming expectation");
                Some((set, done))
            }
        }
    }

    fn resolve(&self, resolution: Resolution) {
        if let Some((set, done)) = self.dispatch(resolution) {
            // a re-arm never reports errors to the caller
            let _ = self.arm(set, done, Origin::Continue);
        }
    }

    pub(crate) fn on_data(&self, chunk: String) {
        if self.shared.output.receiver_count() > 0 {
            let _ = self.shared.output.send(chunk.clone());
        }
        trace!(bytes = chunk.len(), "output");

        let resolution = self.state().feed(&chunk);
        if let Some(resolution) = resolution {
            self.resolve(resolution);
        }
    }

    pub(crate) fn on_timeout(&self) {
        let resolution = self.state().expire();
        if let Some(resolution) = resolution {
            debug!(timeout = ?self.shared.config.timeout, "expectation timed out");
            self.resolve(resolution);
        }
    }

    pub(crate) fn on_eof(&self) {
        debug!("process output closed");
        let resolution = self.state().close();
        if let Some(resolution) = resolution {
            self.resolve(resolution);
        }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.state().deadline()
    }

    /// Send data to the process.
    ///
    /// Data is queued and written in order; this call does not wait for the
    /// write. Control characters are plain bytes:
    ///
    /// ```no_run
    /// # fn example(session: spectcl::Session) -> Result<(), spectcl::ExpectError> {
    /// session.send([0x03])?; // Ctrl-C
    /// session.send(b"\x1b[A")?; // up arrow
    /// session.send("password\r")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`ExpectError::ProcessExited`] once the process input is gone.
    pub fn send(&self, data: impl AsRef<[u8]>) -> Result<(), ExpectError> {
        self.queue(Input::Data(data.as_ref().to_vec(), None))
    }

    /// Send a line to the process (appends `\n`).
    pub fn send_line(&self, line: &str) -> Result<(), ExpectError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.queue(Input::Data(data, None))
    }

    /// Send data and run `callback` once it has been written (or has failed).
    ///
    /// If the input is already gone the callback receives the failure too.
    pub fn send_then<F>(&self, data: impl AsRef<[u8]>, callback: F) -> Result<(), ExpectError>
    where
        F: FnOnce(io::Result<()>) + Send + 'static,
    {
        self.queue(Input::Data(data.as_ref().to_vec(), Some(Box::new(callback))))
    }

    /// Send data and wait until it has been written.
    pub async fn send_async(&self, data: impl AsRef<[u8]>) -> Result<(), ExpectError> {
        let (tx, rx) = oneshot::channel();
        self.send_then(data, move |result| {
            let _ = tx.send(result);
        })?;
        rx.await.map_err(|_| ExpectError::ProcessExited)??;
        Ok(())
    }

    /// Signal end of input: closes stdin of a piped child, sends `^D` on a pty.
    pub fn send_eof(&self) -> Result<(), ExpectError> {
        self.queue(Input::Eof)
    }

    fn queue(&self, input: Input) -> Result<(), ExpectError> {
        if let Input::Data(data, _) = &input {
            trace!(bytes = data.len(), "send");
        }
        self.shared
            .input
            .send(input)
            .map_err(|mpsc::error::SendError(input)| {
                input.abandon();
                ExpectError::ProcessExited
            })
    }

    /// The `expect_out` record: last flushed text and last resolution.
    pub fn expect_out(&self) -> ExpectOut {
        self.state().expect_out.clone()
    }

    /// Output received but not yet consumed by a match.
    pub fn buffer(&self) -> String {
        self.state().buffer.snapshot().to_owned()
    }

    /// Whether an expectation is pending
    pub fn is_expecting(&self) -> bool {
        self.state().is_expecting()
    }

    /// Whether the process output has closed
    pub fn is_eof(&self) -> bool {
        self.state().eof
    }

    /// The configuration this session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Receive every output chunk as it arrives, before matching.
    ///
    /// A receiver that falls more than a few hundred chunks behind skips ahead
    /// (see [`broadcast::error::RecvError::Lagged`]).
    pub fn subscribe_output(&self) -> broadcast::Receiver<String> {
        self.shared.output.subscribe()
    }

    fn child(&self) -> MutexGuard<'_, Option<Box<dyn ProcessChild>>> {
        self.shared
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// OS process id of the child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child().as_ref().and_then(|child| child.pid())
    }

    /// Check if the process is still alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has no child process, or its handle has
    /// been consumed by a previous call to [`wait`](Session::wait).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spectcl::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("sleep 10")?;
    ///
    /// if session.is_alive()? {
    ///     println!("Process is still running");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn is_alive(&self) -> Result<bool, ExpectError> {
        match self.child().as_mut() {
            Some(child) => Ok(child.try_wait()?.is_none()),
            None => Err(ExpectError::ProcessExited),
        }
    }

    /// Wait for the process to exit and return its exit status.
    ///
    /// The child handle is consumed; later calls fail.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spectcl::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("echo done")?;
    ///
    /// let status = session.wait().await?;
    /// println!("Process exited with: {}", status.exit_code());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait(&self) -> Result<ExitStatus, ExpectError> {
        let mut child = self.child().take().ok_or(ExpectError::ProcessExited)?;

        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| ExpectError::IoError(io::Error::other(e)))??;

        debug!(code = status.exit_code(), "process exited");
        Ok(status)
    }

    /// Terminate the process.
    pub fn kill(&self) -> Result<(), ExpectError> {
        match self.child().as_mut() {
            Some(child) => {
                debug!("killing process");
                child.kill()?;
                Ok(())
            }
            None => Err(ExpectError::ProcessExited),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Session")
            .field("buffered", &state.buffer.char_len())
            .field("expecting", &state.is_expecting())
            .field("eof", &state.eof)
            .finish()
    }
}
