//! Child process transports feeding a session
//!
//! A [`Process`] is the session's view of its child: a stream of decoded
//! output chunks ending with EOF, an input queue, and optionally a handle on
//! the child itself. [`SessionBuilder::spawn`](crate::SessionBuilder::spawn)
//! builds one on a pseudo-terminal or on pipes; [`channel`] builds an
//! in-memory one whose other end is driven by hand.

mod filter;
mod io;
mod pipe;
mod pty;

pub use filter::strip_ansi;

use crate::result::ExpectError;
use crate::session::SessionConfig;
use portable_pty::ExitStatus;
use tokio::sync::mpsc;
use tracing::debug;

/// Callback run once a queued write reached the child (or failed).
pub type WriteCallback = Box<dyn FnOnce(std::io::Result<()>) + Send>;

/// What the transport reports to the session.
#[derive(Debug)]
pub(crate) enum ProcessEvent {
    /// A chunk of output, already decoded and filtered.
    Data(String),
    /// Every output stream has closed.
    Eof,
}

/// What the session asks the transport to do.
pub(crate) enum Input {
    Data(Vec<u8>, Option<WriteCallback>),
    Eof,
}

impl Input {
    /// Report failure to the write callback, if any.
    pub(crate) fn abandon(self) {
        if let Input::Data(_, Some(callback)) = self {
            callback(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "process input is closed",
            )));
        }
    }
}

/// Lifecycle control over a spawned child.
pub trait ProcessChild: Send {
    /// Exit status if the child has exited, without blocking.
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    /// Block until the child exits.
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
    /// Terminate the child.
    fn kill(&mut self) -> std::io::Result<()>;
    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;
}

/// The session-facing side of a child process.
pub struct Process {
    pub(crate) events: mpsc::UnboundedReceiver<ProcessEvent>,
    pub(crate) input: mpsc::UnboundedSender<Input>,
    pub(crate) child: Option<Box<dyn ProcessChild>>,
}

impl Process {
    /// OS process id of the child, when there is one.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.pid())
    }
}

/// Spawn `program` with `args` according to `config.pty`.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn(program: &str, args: &[String], config: &SessionConfig) -> Result<Process, ExpectError> {
    let process = if config.pty {
        pty::spawn(program, args, config)?
    } else {
        pipe::spawn(program, args, config)?
    };
    debug!(program, pid = ?process.pid(), pty = config.pty, "spawned");
    Ok(process)
}

/// Build an in-memory transport.
///
/// The [`Process`] goes to [`SessionBuilder::attach`](crate::SessionBuilder::attach);
/// the [`Remote`] plays the child: it produces output and EOF and receives what
/// the session sends.
///
/// # Examples
///
/// ```
/// use spectcl::{process, Expectations, Flow, Session};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (process, remote) = process::channel();
/// let session = Session::builder().attach(process);
///
/// remote.output("login: ");
/// let outcome = session
///     .expect_async(Expectations::new().on("login:", |_, m, done| {
///         done.complete_with(m.buffer.clone());
///         Flow::Complete
///     }))
///     .await;
/// assert_eq!(outcome.unwrap().as_deref(), Some("login:"));
/// # }
/// ```
pub fn channel() -> (Process, Remote) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let process = Process {
        events: events_rx,
        input: input_tx,
        child: None,
    };
    let remote = Remote {
        events: events_tx,
        input: input_rx,
    };
    (process, remote)
}

/// Something the session wrote to a [`Remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    /// Bytes from `send` and friends
    Data(Vec<u8>),
    /// `send_eof` was called
    Eof,
}

impl Written {
    /// The written bytes as text (lossy); empty for `Eof`.
    pub fn text(&self) -> String {
        match self {
            Written::Data(data) => String::from_utf8_lossy(data).into_owned(),
            Written::Eof => String::new(),
        }
    }
}

/// The child's end of an in-memory transport.
pub struct Remote {
    events: mpsc::UnboundedSender<ProcessEvent>,
    input: mpsc::UnboundedReceiver<Input>,
}

impl Remote {
    /// Produce output. Returns `false` once the session side is gone.
    pub fn output(&self, text: impl Into<String>) -> bool {
        self.events.send(ProcessEvent::Data(text.into())).is_ok()
    }

    /// Close the output stream.
    pub fn eof(&self) {
        let _ = self.events.send(ProcessEvent::Eof);
    }

    /// Wait for the next thing the session writes.
    ///
    /// Acknowledges the write to its callback. `None` once the session is gone.
    pub async fn next_input(&mut self) -> Option<Written> {
        let input = self.input.recv().await?;
        Some(Self::accept(input))
    }

    /// Like [`next_input`](Remote::next_input) without waiting.
    pub fn try_next_input(&mut self) -> Option<Written> {
        self.input.try_recv().ok().map(Self::accept)
    }

    fn accept(input: Input) -> Written {
        match input {
            Input::Data(data, callback) => {
                if let Some(callback) = callback {
                    callback(Ok(()));
                }
                Written::Data(data)
            }
            Input::Eof => Written::Eof,
        }
    }
}
