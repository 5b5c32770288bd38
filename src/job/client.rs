//! Caller side of the job protocol.
//!
//! [`KernelClient`] hands jobs to worker threads and awaits their replies
//! without blocking the caller's runtime. Every job gets a fresh id, a
//! cancellation token and a semaphore permit; the permit stays with the job
//! until a worker has finished or skipped it, which bounds the work queued
//! behind callers that time out and resubmit.

use crate::boolean::BooleanOp;
use crate::cancel::CancelToken;
use crate::errors::KernelError;
use crate::float_types::Real;
use crate::job::config::KernelConfig;
use crate::job::dispatcher::{Execute, GeometryExecutor};
use crate::job::protocol::{CANCEL_TAG, Command, JobId, JobOutput, JobResult, Preview, peek_id};
use crate::job::worker::{Frame, Liveness, Payload, lock, spawn_worker};
use crate::sketch::Profile;
use crate::solid::Solid;
use crate::tessellate::{Mesh, Tessellation};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{Semaphore, oneshot};
use tokio::time::{Instant, timeout_at};

type Pending = Arc<Mutex<HashMap<JobId, oneshot::Sender<JobResult>>>>;

/// Handle to a pool of kernel worker threads.
///
/// Must be created inside a tokio runtime, which hosts the task routing
/// replies back to their callers. Dropping the client closes the worker
/// inboxes; [`shutdown`](Self::shutdown) also waits for the threads.
#[derive(Debug)]
pub struct KernelClient {
    config: KernelConfig,
    inboxes: Vec<UnboundedSender<Frame>>,
    workers: Vec<JoinHandle<()>>,
    pending: Pending,
    live: Liveness,
    permits: Arc<Semaphore>,
    next: AtomicUsize,
}

impl KernelClient {
    /// Client running the geometry kernel.
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        Self::with_executor(config, |_| GeometryExecutor)
    }

    /// Client whose workers run executors built by `make`, called once per
    /// worker with the worker index.
    pub fn with_executor<E, F>(config: KernelConfig, mut make: F) -> Result<Self, KernelError>
    where
        E: Execute,
        F: FnMut(usize) -> E,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            KernelError::Kernel("KernelClient must be created inside a tokio runtime".to_string())
        })?;

        let pending = Pending::default();
        let live = Liveness::default();
        let (reply_tx, reply_rx) = unbounded_channel();

        let count = config.workers.max(1);
        let mut inboxes = Vec::with_capacity(count);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = unbounded_channel();
            let handle = spawn_worker(index, make(index), rx, reply_tx.clone(), live.clone())
                .map_err(|e| KernelError::Kernel(format!("failed to start worker {index}: {e}")))?;
            inboxes.push(tx);
            workers.push(handle);
        }
        drop(reply_tx);

        runtime.spawn(route_replies(reply_rx, pending.clone()));
        tracing::debug!(
            workers = count,
            max_in_flight = config.max_in_flight,
            timeout_ms = config.timeout_ms,
            "kernel client started"
        );

        Ok(KernelClient {
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            config,
            inboxes,
            workers,
            pending,
            live,
            next: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Jobs submitted and not yet answered or abandoned.
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Abandons a job: a queued job is skipped, a running one stops at its next
    /// checkpoint, and its caller gets [`KernelError::Cancelled`]. Returns
    /// false when no such job is live.
    pub fn cancel(&self, id: &JobId) -> bool {
        let live = self.live.cancel(id);
        // Dropping the sender wakes the waiting caller
        let waiting = lock(&self.pending).remove(id).is_some();
        live || waiting
    }

    /// Submits `command` and waits at most `timeout` (the configured default
    /// when `None`) for a slot and for the reply.
    pub async fn submit(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<JobOutput, KernelError> {
        self.submit_with_id(JobId::new(), command, timeout).await
    }

    /// Like [`submit`](Self::submit) with a caller-chosen id, so the job can
    /// be cancelled from elsewhere. Fails with [`KernelError::DuplicateJob`]
    /// while another job with the same id is in flight.
    pub async fn submit_with_id(
        &self,
        id: JobId,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<JobOutput, KernelError> {
        self.run(id, Payload::Typed(command), timeout)
            .await?
            .into_result()
    }

    /// Submits a request already in wire form and returns the reply's
    /// `result`. A missing or unreadable `id` is replaced by a fresh one.
    /// `CANCEL` requests are applied locally and resolve to `null`.
    pub async fn submit_wire(
        &self,
        mut request: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, KernelError> {
        let id = match peek_id(&request) {
            Some(id) => id,
            None => {
                let id = JobId::new();
                let Some(fields) = request.as_object_mut() else {
                    return Err(KernelError::Kernel(
                        "request must be a JSON object".to_string(),
                    ));
                };
                fields.insert("id".to_string(), serde_json::to_value(&id)?);
                id
            },
        };

        if request.get("cmd").and_then(Value::as_str) == Some(CANCEL_TAG) {
            self.cancel(&id);
            return Ok(Value::Null);
        }

        let result = self.run(id, Payload::Wire(request), timeout).await?.into_result()?;
        Ok(serde_json::to_value(result)?)
    }

    pub async fn sanitize_profile(&self, profile: Profile) -> Result<Profile, KernelError> {
        match self.submit(Command::SanitizeProfile { profile }, None).await? {
            JobOutput::Profile(profile) => Ok(profile),
            other => Err(unexpected("SANITIZE_PROFILE", &other)),
        }
    }

    pub async fn pad_preview(
        &self,
        profile: Profile,
        height: Real,
        tess: Option<Tessellation>,
    ) -> Result<Preview, KernelError> {
        let command = Command::PadPreview {
            profile,
            height,
            tess,
        };
        match self.submit(command, None).await? {
            JobOutput::Preview(preview) => Ok(preview),
            other => Err(unexpected("PAD_PREVIEW", &other)),
        }
    }

    pub async fn boolean_preview(
        &self,
        op: BooleanOp,
        a: Solid,
        b: Solid,
        tess: Option<Tessellation>,
    ) -> Result<Preview, KernelError> {
        match self.submit(Command::BooleanPreview { op, a, b, tess }, None).await? {
            JobOutput::Preview(preview) => Ok(preview),
            other => Err(unexpected("BOOLEAN_PREVIEW", &other)),
        }
    }

    pub async fn tessellate_refine(
        &self,
        shape: Solid,
        tess: Tessellation,
    ) -> Result<Mesh, KernelError> {
        match self.submit(Command::TessellateRefine { shape, tess }, None).await? {
            JobOutput::Refined(refined) => Ok(refined.mesh),
            other => Err(unexpected("TESSELLATE_REFINE", &other)),
        }
    }

    /// Closes the worker inboxes and waits for the threads to finish the jobs
    /// already queued.
    pub async fn shutdown(mut self) {
        self.inboxes.clear();
        let workers = std::mem::take(&mut self.workers);
        let joined = tokio::task::spawn_blocking(move || {
            workers
                .into_iter()
                .filter_map(|handle| handle.join().err())
                .count()
        })
        .await;
        match joined {
            Ok(0) => tracing::debug!("kernel client shut down"),
            Ok(panicked) => tracing::warn!(panicked, "worker threads panicked"),
            Err(e) => tracing::warn!(error = %e, "failed to join worker threads"),
        }
    }

    async fn run(
        &self,
        id: JobId,
        payload: Payload,
        timeout: Option<Duration>,
    ) -> Result<JobResult, KernelError> {
        let timeout = timeout.unwrap_or_else(|| self.config.timeout());
        let deadline = Instant::now() + timeout;

        let permit = match timeout_at(deadline, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(KernelError::Disconnected),
            Err(_) => {
                tracing::warn!(%id, ?timeout, "timed out waiting for a job slot");
                return Err(KernelError::Timeout);
            },
        };

        let (tx, rx) = oneshot::channel();
        let cancel = {
            let mut pending = lock(&self.pending);
            if pending.contains_key(&id) {
                return Err(KernelError::DuplicateJob(id));
            }
            let Some(cancel) = self.live.register(id.clone()) else {
                return Err(KernelError::DuplicateJob(id));
            };
            pending.insert(id.clone(), tx);
            cancel
        };
        let mut guard = InFlight {
            client: self,
            id: id.clone(),
            cancel: cancel.clone(),
            settled: false,
        };

        let worker = self.next.fetch_add(1, Ordering::Relaxed) % self.inboxes.len().max(1);
        let frame = Frame {
            id: id.clone(),
            payload,
            cancel: cancel.clone(),
            permit: Some(permit),
        };
        let sent = self
            .inboxes
            .get(worker)
            .is_some_and(|inbox| inbox.send(frame).is_ok());
        if !sent {
            return Err(KernelError::Disconnected);
        }
        tracing::debug!(%id, worker, "job submitted");

        match timeout_at(deadline, rx).await {
            Ok(Ok(reply)) => {
                guard.settled = true;
                Ok(reply)
            },
            Ok(Err(_)) if cancel.is_cancelled() => Err(KernelError::Cancelled),
            Ok(Err(_)) => Err(KernelError::Disconnected),
            Err(_) => {
                tracing::warn!(%id, ?timeout, "Worker timeout");
                Err(KernelError::Timeout)
            },
        }
    }

    fn forget(&self, id: &JobId) {
        lock(&self.pending).remove(id);
        self.live.finish(id);
    }
}

/// Deregisters a job however its caller stops waiting. Unless a reply was
/// received the job is also cancelled, so the worker skips or abandons it.
struct InFlight<'a> {
    client: &'a KernelClient,
    id: JobId,
    cancel: CancelToken,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cancel.cancel();
        }
        self.client.forget(&self.id);
    }
}

fn unexpected(cmd: &str, output: &JobOutput) -> KernelError {
    let kind = match output {
        JobOutput::Preview(_) => "preview",
        JobOutput::Refined(_) => "refined mesh",
        JobOutput::Profile(_) => "profile",
    };
    KernelError::Kernel(format!("unexpected {kind} result for {cmd}"))
}

async fn route_replies(mut replies: UnboundedReceiver<JobResult>, pending: Pending) {
    while let Some(reply) = replies.recv().await {
        let id = reply.id();
        let waiter = lock(&pending).remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    tracing::debug!(%id, "caller stopped waiting");
                }
            },
            None => tracing::warn!(%id, "dropping late reply"),
        }
    }
    tracing::debug!("reply router stopped");
}
