//! Children on plain pipes, stdout and stderr interleaved

use super::filter::OutputFilter;
use super::io::{spawn_reader, spawn_writer, watch_streams, EofAction};
use super::{Process, ProcessChild};
use crate::result::ExpectError;
use crate::session::SessionConfig;
use portable_pty::ExitStatus;
use std::process::{Child, Command, Stdio};
use tokio::sync::mpsc;

struct PipeChild(Child);

fn exit_status(status: std::process::ExitStatus) -> ExitStatus {
    // killed by a signal: no code, report failure
    ExitStatus::with_exit_code(status.code().map_or(1, |code| code as u32))
}

impl ProcessChild for PipeChild {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Ok(self.0.try_wait()?.map(exit_status))
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.0.wait().map(exit_status)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.0.kill()
    }

    fn pid(&self) -> Option<u32> {
        Some(self.0.id())
    }
}

pub(crate) fn spawn(program: &str, args: &[String], config: &SessionConfig) -> Result<Process, ExpectError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExpectError::SpawnError(e.to_string()))?;

    let missing = |name: &str| ExpectError::SpawnError(format!("child {name} is not piped"));
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let streams = vec![
        spawn_reader(Box::new(stdout), OutputFilter::new(config), events_tx.clone()),
        spawn_reader(Box::new(stderr), OutputFilter::new(config), events_tx.clone()),
    ];
    watch_streams(streams, events_tx);

    let input = spawn_writer(Box::new(stdin), EofAction::Close, None);

    Ok(Process {
        events: events_rx,
        input,
        child: Some(Box::new(PipeChild(child))),
    })
}
