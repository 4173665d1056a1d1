//! Background task feeding process events and deadlines into a session

use super::{Session, Shared};
use crate::process::ProcessEvent;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Notify};
use tokio::time;
use tracing::trace;

/// Multiplex output, EOF and the pending inactivity deadline.
///
/// Holds only a weak reference between events so that dropping the last
/// [`Session`] handle ends the task. `wake` is notified whenever the deadline
/// may have changed from outside this task.
pub(super) async fn drive(
    shared: Weak<Shared>,
    wake: Arc<Notify>,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
) {
    trace!("session driver started");
    loop {
        let Some(deadline) = Session::upgrade(&shared).map(|session| session.deadline()) else {
            break;
        };
        let timer = async move {
            match deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            event = events.recv() => {
                let Some(session) = Session::upgrade(&shared) else {
                    break;
                };
                match event {
                    Some(ProcessEvent::Data(chunk)) => session.on_data(chunk),
                    Some(ProcessEvent::Eof) | None => {
                        session.on_eof();
                        break;
                    }
                }
            }
            () = timer => {
                if let Some(session) = Session::upgrade(&shared) {
                    session.on_timeout();
                }
            }
            () = wake.notified() => {}
        }
    }
    trace!("session driver stopped");
}
