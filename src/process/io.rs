//! Blocking reader/writer tasks bridging a child's streams to channels

use super::filter::OutputFilter;
use super::{Input, ProcessEvent};
use std::any::Any;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// How `send_eof` is delivered to the child.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EofAction {
    /// Close the input stream (pipes)
    Close,
    /// Write a byte (the terminal's EOF character on a pty)
    Write(u8),
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

/// Read `reader` until it closes, forwarding filtered chunks as events.
///
/// Read errors end the stream: a pty master reports EIO once the child side
/// is gone.
pub(crate) fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    mut filter: OutputFilter,
    events: mpsc::UnboundedSender<ProcessEvent>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = filter.feed(&buf[..n]);
                    trace!(bytes = n, "read");
                    if !chunk.is_empty() && events.send(ProcessEvent::Data(chunk)).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "output stream closed with error");
                    break;
                }
            }
        }
        let tail = filter.finish();
        if !tail.is_empty() {
            let _ = events.send(ProcessEvent::Data(tail));
        }
    })
}

/// Report EOF once every reader has finished.
pub(crate) fn watch_streams(readers: Vec<JoinHandle<()>>, events: mpsc::UnboundedSender<ProcessEvent>) {
    tokio::spawn(async move {
        for reader in readers {
            let _ = reader.await;
        }
        trace!("all output streams closed");
        let _ = events.send(ProcessEvent::Eof);
    });
}

/// Serve the input queue in order, writing on the blocking pool.
///
/// `keepalive` is held for as long as the queue is open (the pty master).
pub(crate) fn spawn_writer(
    writer: Box<dyn Write + Send>,
    eof: EofAction,
    keepalive: Option<Box<dyn Any + Send>>,
) -> mpsc::UnboundedSender<Input> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Input>();
    let writer: SharedWriter = Arc::new(Mutex::new(Some(writer)));

    tokio::spawn(async move {
        let _keepalive = keepalive;
        while let Some(input) = rx.recv().await {
            match input {
                Input::Data(data, callback) => {
                    let result = write(writer.clone(), data).await;
                    if let Err(e) = &result {
                        debug!(error = %e, "write to child failed");
                    }
                    if let Some(callback) = callback {
                        callback(result);
                    }
                }
                Input::Eof => match eof {
                    EofAction::Close => {
                        trace!("closing child input");
                        writer.lock().await.take();
                    }
                    EofAction::Write(byte) => {
                        if let Err(e) = write(writer.clone(), vec![byte]).await {
                            debug!(error = %e, "sending EOF character failed");
                        }
                    }
                },
            }
        }
        trace!("input queue closed");
    });

    tx
}

async fn write(writer: SharedWriter, data: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut writer = writer.blocking_lock();
        let writer = writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child input is closed"))?;
        writer.write_all(&data)?;
        writer.flush()
    })
    .await
    .map_err(io::Error::other)?
}
