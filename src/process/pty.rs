//! Children attached to a pseudo-terminal

use super::filter::OutputFilter;
use super::io::{spawn_reader, spawn_writer, watch_streams, EofAction};
use super::{Process, ProcessChild};
use crate::result::ExpectError;
use crate::session::SessionConfig;
use portable_pty::{native_pty_system, CommandBuilder, ExitStatus, PtyPair};
use tokio::sync::mpsc;

/// ^D, the terminal's EOF character in canonical mode
const EOF_CHAR: u8 = 0x04;

struct PtyChild(Box<dyn portable_pty::Child + Send>);

impl ProcessChild for PtyChild {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.0.try_wait()
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.0.wait()
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.0.kill()
    }

    fn pid(&self) -> Option<u32> {
        self.0.process_id()
    }
}

pub(crate) fn spawn(program: &str, args: &[String], config: &SessionConfig) -> Result<Process, ExpectError> {
    let pty_system = native_pty_system();

    let PtyPair { master, slave } = pty_system
        .openpty(config.pty_size)
        .map_err(|e| ExpectError::PtyError(e.to_string()))?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);

    let child: Box<dyn portable_pty::Child + Send> = slave
        .spawn_command(cmd)
        .map_err(|e| ExpectError::SpawnError(e.to_string()))?;

    // The master only sees EOF once no slave handle is left open on our side
    drop(slave);

    let reader = master
        .try_clone_reader()
        .map_err(|e| ExpectError::PtyError(e.to_string()))?;
    let writer = master
        .take_writer()
        .map_err(|e| ExpectError::PtyError(e.to_string()))?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let stream = spawn_reader(reader, OutputFilter::new(config), events_tx.clone());
    watch_streams(vec![stream], events_tx);

    let input = spawn_writer(writer, EofAction::Write(EOF_CHAR), Some(Box::new(master)));

    Ok(Process {
        events: events_rx,
        input,
        child: Some(Box::new(PtyChild(child))),
    })
}
