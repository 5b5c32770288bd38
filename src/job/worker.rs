//! Worker threads and the table of live jobs.

use crate::cancel::CancelToken;
use crate::job::dispatcher::{Execute, dispatch, dispatch_value};
use crate::job::protocol::{Command, Job, JobId, JobResult};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation tokens of the jobs queued or running, by id.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<Mutex<HashMap<JobId, CancelToken>>>);

impl Liveness {
    /// Tracks `id`, returning the token its worker will poll. Returns `None`
    /// when a job with the same id is already live.
    pub fn register(&self, id: JobId) -> Option<CancelToken> {
        match lock(&self.0).entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(CancelToken::new()).clone()),
        }
    }

    /// Marks `id` abandoned. Returns false when the job is not live.
    pub fn cancel(&self, id: &JobId) -> bool {
        match lock(&self.0).get(id) {
            Some(token) => {
                token.cancel();
                true
            },
            None => false,
        }
    }

    /// Stops tracking `id`.
    pub fn finish(&self, id: &JobId) {
        lock(&self.0).remove(id);
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a worker is asked to run.
#[derive(Debug)]
pub enum Payload {
    Typed(Command),
    /// A raw request, decoded on the worker.
    Wire(Value),
}

/// One queued job.
#[derive(Debug)]
pub struct Frame {
    pub id: JobId,
    pub payload: Payload,
    pub cancel: CancelToken,
    /// Released once the worker is done with the frame.
    pub permit: Option<OwnedSemaphorePermit>,
}

/// Starts a worker thread draining `inbox` one frame at a time.
///
/// The thread exits when the inbox closes or nobody listens for replies.
pub fn spawn_worker<E: Execute>(
    index: usize,
    mut executor: E,
    mut inbox: UnboundedReceiver<Frame>,
    replies: UnboundedSender<JobResult>,
    live: Liveness,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("padkernel-worker-{index}"))
        .spawn(move || {
            tracing::debug!(worker = index, "worker started");
            while let Some(frame) = inbox.blocking_recv() {
                let Frame {
                    id,
                    payload,
                    cancel,
                    permit,
                } = frame;
                let reply = match payload {
                    Payload::Typed(command) => {
                        let job = Job {
                            id: id.clone(),
                            command,
                        };
                        dispatch(&mut executor, job, &cancel)
                    },
                    Payload::Wire(value) => dispatch_value(&mut executor, value, &cancel),
                };
                live.finish(&id);
                drop(permit);

                if let Some(reply) = reply {
                    if replies.send(reply).is_err() {
                        tracing::debug!(worker = index, "reply channel closed");
                        break;
                    }
                }
            }
            tracing::debug!(worker = index, "worker stopped");
        })
}
