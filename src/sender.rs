//! Writes oversized commands from a separate task.
//!
//! While a long command is being written the server may already answer.
//! If nobody reads, both sides end up blocked on full socket buffers. The
//! background sender takes over the write so the session keeps draining
//! replies, and reports the outcome when joined.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::{LineWriter, SessionError, TransportError};

/// Writing half shared between the session and the background sender.
pub(crate) type SharedWriter = Arc<Mutex<Box<dyn LineWriter>>>;

type SendOutcome = Result<(), TransportError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SenderState {
    Idle,
    Sending,
    ShuttingDown,
}

struct SendJob {
    text: String,
    done: oneshot::Sender<SendOutcome>,
}

/// Long-lived writer task with room for a single outstanding command.
pub(crate) struct BackgroundSender {
    jobs: Option<mpsc::Sender<SendJob>>,
    pending: Option<oneshot::Receiver<SendOutcome>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BackgroundSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSender")
            .field("state", &self.state())
            .finish()
    }
}

impl BackgroundSender {
    /// Starts the writer task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(writer: SharedWriter) -> Self {
        let (jobs, mut queue) = mpsc::channel::<SendJob>(1);
        let task = tokio::spawn(async move {
            while let Some(job) = queue.recv().await {
                let outcome = writer.lock().await.write_line(&job.text).await;
                // the session may have stopped waiting; nothing left to report to
                let _ = job.done.send(outcome);
            }
        });
        Self {
            jobs: Some(jobs),
            pending: None,
            task: Some(task),
        }
    }

    pub(crate) fn state(&self) -> SenderState {
        if self.jobs.is_none() {
            SenderState::ShuttingDown
        } else if self.pending.is_some() {
            SenderState::Sending
        } else {
            SenderState::Idle
        }
    }

    /// Hands `text` to the writer task. Only valid while idle.
    pub(crate) fn send(&mut self, text: String) -> Result<(), SessionError> {
        let jobs = match (self.state(), &self.jobs) {
            (SenderState::Idle, Some(jobs)) => jobs,
            (SenderState::Sending, _) => {
                return Err(SessionError::Usage(
                    "background sender already in use".to_owned(),
                ))
            }
            _ => {
                return Err(SessionError::Usage(
                    "background sender is shutting down".to_owned(),
                ))
            }
        };
        let (done, pending) = oneshot::channel();
        jobs.try_send(SendJob { text, done }).map_err(|err| {
            SessionError::Usage(match err {
                mpsc::error::TrySendError::Full(_) => "background sender already in use",
                mpsc::error::TrySendError::Closed(_) => "background sender is shutting down",
            }
            .to_owned())
        })?;
        self.pending = Some(pending);
        Ok(())
    }

    /// Waits for the outstanding write, if any, and returns its outcome.
    pub(crate) async fn join(&mut self) -> SendOutcome {
        match self.pending.take() {
            None => Ok(()),
            Some(pending) => pending.await.unwrap_or(Err(TransportError::Closed)),
        }
    }

    /// Stops the writer task. Calling it again has no effect.
    pub(crate) fn shutdown(&mut self) {
        self.jobs = None;
        self.pending = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for BackgroundSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}
