//! Line-delimited JSON front end for a pool of worker threads.
//!
//! One request per input line, one reply per output line. `CANCEL` lines take
//! effect immediately, even for queued jobs, and are never answered. At most
//! `max_in_flight` jobs may be queued or running; a request past that limit,
//! or one reusing the id of a live job, is answered with an error right away
//! instead of being queued.

use crate::errors::KernelError;
use crate::job::config::KernelConfig;
use crate::job::dispatcher::Execute;
use crate::job::protocol::{CANCEL_TAG, JobId, JobResult, peek_id};
use crate::job::worker::{Frame, Liveness, Payload, spawn_worker};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Serves requests read from `input` until it reaches EOF, then lets the
/// workers drain their queues and flushes the remaining replies to `output`.
///
/// `make` builds one executor per worker, given the worker index.
pub async fn serve<R, W, E, F>(
    config: &KernelConfig,
    input: R,
    mut output: W,
    mut make: F,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: Execute,
    F: FnMut(usize) -> E,
{
    let live = Liveness::default();
    let (reply_tx, reply_rx) = unbounded_channel::<JobResult>();

    let count = config.workers.max(1);
    let mut inboxes = Vec::with_capacity(count);
    let mut workers = Vec::with_capacity(count);
    for index in 0..count {
        let (tx, rx) = unbounded_channel::<Frame>();
        workers.push(spawn_worker(index, make(index), rx, reply_tx.clone(), live.clone())?);
        inboxes.push(tx);
    }
    tracing::info!(
        workers = count,
        max_in_flight = config.max_in_flight,
        "padkernel worker ready"
    );

    let mut intake = Intake {
        live,
        inboxes,
        permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        limit: config.max_in_flight.max(1),
        replies: reply_tx,
        next: 0,
    };

    let reading = async move {
        let read = intake.read_all(input).await;
        // EOF: closing the inboxes lets the workers finish and hang up
        drop(intake);
        let joined = tokio::task::spawn_blocking(move || {
            workers.into_iter().all(|handle| handle.join().is_ok())
        })
        .await;
        if !matches!(joined, Ok(true)) {
            tracing::warn!("a worker thread panicked");
        }
        read
    };
    let (read, written) = tokio::join!(reading, write_replies(reply_rx, &mut output));
    read.and(written)
}

/// Reader-side state: routes each request line to a worker.
struct Intake {
    live: Liveness,
    inboxes: Vec<UnboundedSender<Frame>>,
    permits: Arc<Semaphore>,
    limit: usize,
    replies: UnboundedSender<JobResult>,
    next: usize,
}

impl Intake {
    async fn read_all<R: AsyncBufRead + Unpin>(&mut self, input: R) -> io::Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                self.accept(&line);
            }
        }
        Ok(())
    }

    fn accept(&mut self, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed request line");
                return;
            },
        };
        let Some(id) = peek_id(&value) else {
            tracing::warn!("dropping request without a readable id");
            return;
        };

        if value.get("cmd").and_then(Value::as_str) == Some(CANCEL_TAG) {
            let found = self.live.cancel(&id);
            tracing::debug!(%id, found, "cancel requested");
            return;
        }

        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            tracing::warn!(%id, limit = self.limit, "job slots exhausted, request refused");
            self.refuse(id, KernelError::Busy(self.limit));
            return;
        };
        let Some(cancel) = self.live.register(id.clone()) else {
            tracing::warn!(%id, "duplicate job id refused");
            self.refuse(id.clone(), KernelError::DuplicateJob(id));
            return;
        };

        let frame = Frame {
            id: id.clone(),
            payload: Payload::Wire(value),
            cancel,
            permit: Some(permit),
        };
        let worker = self.next % self.inboxes.len().max(1);
        self.next = self.next.wrapping_add(1);
        let sent = self
            .inboxes
            .get(worker)
            .is_some_and(|inbox| inbox.send(frame).is_ok());
        if !sent {
            self.live.finish(&id);
            tracing::warn!(%id, worker, "worker gone, request dropped");
        }
    }

    fn refuse(&self, id: JobId, error: KernelError) {
        let reply = JobResult::Err {
            id,
            error: Some(error.to_string()),
        };
        if self.replies.send(reply).is_err() {
            tracing::debug!("reply writer gone");
        }
    }
}

async fn write_replies<W: AsyncWrite + Unpin>(
    mut replies: UnboundedReceiver<JobResult>,
    output: &mut W,
) -> io::Result<()> {
    while let Some(reply) = replies.recv().await {
        let mut line = match serde_json::to_vec(&reply) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(id = %reply.id(), error = %e, "failed to encode reply");
                continue;
            },
        };
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}
