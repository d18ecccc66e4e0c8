//! Execution context: runs an [`UploadWorker`] on its own task.
//!
//! The caller talks to the task through an [`UploadHandle`]. Commands go in
//! over one channel, events come back over another, in the order the worker
//! produced them.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::types::{RequestState, UploadEvent, UploadProgress, UploadRequest, UploadResult};
use crate::worker::UploadWorker;

/// Commands accepted by a context.
#[derive(Debug)]
pub enum Command {
    StartUpload(UploadRequest),
    Cancel,
}

/// How a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The task stopped within the grace period.
    Quiesced,
    /// The task did not stop in time and was left to finish on its own.
    Abandoned,
}

/// Caller side of an execution context.
///
/// Dropping the handle asks the task to stop without waiting for it.
pub struct UploadHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<UploadEvent>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    grace: Duration,
}

impl UploadHandle {
    /// Spawns the context task. Must be called from within a Tokio runtime.
    pub fn spawn(worker: UploadWorker, grace: Duration) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run(worker, commands_rx, events_tx, shutdown.clone()));

        Self {
            commands: commands_tx,
            events: events_rx,
            shutdown,
            task: Some(task),
            grace,
        }
    }

    /// Queues a start command. Never blocks.
    ///
    /// Fails with `Busy` only if the context has already stopped.
    pub fn start(&self, request: UploadRequest) -> Result<(), UploadError> {
        self.commands
            .send(Command::StartUpload(request))
            .map_err(|_| UploadError::Busy)
    }

    /// Queues a cancel command. Idempotent; a no-op once the request ended.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    /// Waits for the next event. `None` once the context has stopped.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<UploadEvent> {
        self.events.try_recv().ok()
    }

    /// Consumes events until the request ends, passing progress to
    /// `on_progress`.
    ///
    /// A cancelled request yields `Err(UploadError::Cancelled)`.
    pub async fn wait(
        &mut self,
        mut on_progress: impl FnMut(&UploadProgress),
    ) -> Result<UploadResult, UploadError> {
        while let Some(event) = self.events.recv().await {
            match event {
                UploadEvent::Progress(progress) => on_progress(&progress),
                UploadEvent::Completed(result) => return Ok(result),
                UploadEvent::Failed(err) => return Err(err),
                UploadEvent::Cancelled => return Err(UploadError::Cancelled),
                UploadEvent::Rejected(err) => debug!(error = %err, "start command rejected"),
            }
        }
        Err(UploadError::Network(
            "upload context stopped before reporting a result".into(),
        ))
    }

    /// Signals the task to stop and waits up to the grace period.
    pub async fn shutdown(mut self) -> Teardown {
        self.shutdown.cancel();
        match self.task.take() {
            Some(task) => teardown(task, self.grace).await,
            None => Teardown::Quiesced,
        }
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Waits for `task` up to `grace`. On timeout the task is detached, not
/// aborted.
pub(crate) async fn teardown(task: JoinHandle<()>, grace: Duration) -> Teardown {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(())) => {
            debug!("upload context stopped");
            Teardown::Quiesced
        }
        Ok(Err(e)) => {
            error!(error = %e, "upload context task failed");
            Teardown::Quiesced
        }
        Err(_) => {
            error!(
                grace_ms = grace.as_millis() as u64,
                "upload context did not stop in time, abandoning it"
            );
            Teardown::Abandoned
        }
    }
}

fn reject(events: &mpsc::UnboundedSender<UploadEvent>) {
    warn!("start rejected: an upload is already in progress");
    let _ = events.send(UploadEvent::Rejected(UploadError::Busy));
}

async fn run(
    mut worker: UploadWorker,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<UploadEvent>,
    shutdown: CancellationToken,
) {
    debug!("upload context started");

    loop {
        let command = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let request = match command {
            Command::Cancel => {
                debug!("cancel ignored: no active upload");
                continue;
            }
            Command::StartUpload(_) if worker.state() != RequestState::Idle => {
                reject(&events);
                continue;
            }
            Command::StartUpload(request) => request,
        };

        let cancel = shutdown.child_token();
        let mut commands_open = true;

        // Commands queued behind the start apply before the source is opened.
        loop {
            match commands.try_recv() {
                Ok(Command::Cancel) => cancel.cancel(),
                Ok(Command::StartUpload(_)) => reject(&events),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    commands_open = false;
                    break;
                }
            }
        }

        let state = {
            let upload = worker.upload(request, &cancel, &events);
            tokio::pin!(upload);
            loop {
                tokio::select! {
                    biased;
                    state = &mut upload => break state,
                    command = commands.recv(), if commands_open => match command {
                        Some(Command::Cancel) => {
                            debug!("cancel requested");
                            cancel.cancel();
                        }
                        Some(Command::StartUpload(_)) => reject(&events),
                        None => commands_open = false,
                    },
                }
            }
        };
        info!(?state, "upload request finished");
    }

    debug!("upload context stopped");
}
