//! Execution-context side: running one job at a time to a reply.

use crate::boolean::compose;
use crate::cancel::CancelToken;
use crate::errors::KernelError;
use crate::job::protocol::{
    Command, Job, JobOutput, JobResult, Preview, Refined, Rejected, Request, decode_request,
};
use crate::sketch::extrude::pad;
use crate::tessellate::{Tessellation, emit, refine};
use serde_json::Value;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Runs commands for a worker.
///
/// Implementations run on the worker's own thread and may block.
pub trait Execute: Send + 'static {
    fn execute(
        &mut self,
        command: Command,
        cancel: &CancelToken,
    ) -> Result<JobOutput, KernelError>;
}

/// The kernel stages: sanitize, pad, compose and emit.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometryExecutor;

impl Execute for GeometryExecutor {
    fn execute(
        &mut self,
        command: Command,
        cancel: &CancelToken,
    ) -> Result<JobOutput, KernelError> {
        run(command, cancel)
    }
}

fn check_hints(tess: Option<&Tessellation>) -> Result<(), KernelError> {
    tess.map_or(Ok(()), Tessellation::validate)
}

/// Runs a command through the kernel stages it names.
pub fn run(command: Command, cancel: &CancelToken) -> Result<JobOutput, KernelError> {
    match command {
        Command::SanitizeProfile { profile } => Ok(JobOutput::Profile(profile.sanitize()?)),
        Command::PadPreview {
            profile,
            height,
            tess,
        } => {
            check_hints(tess.as_ref())?;
            let shape = pad(&profile, height)?;
            let mesh = emit(&shape, Some(cancel))?;
            Ok(JobOutput::Preview(Preview { mesh, shape }))
        },
        Command::BooleanPreview { op, a, b, tess } => {
            check_hints(tess.as_ref())?;
            let shape = compose(op, &a, &b)?;
            let mesh = emit(&shape, Some(cancel))?;
            Ok(JobOutput::Preview(Preview { mesh, shape }))
        },
        Command::TessellateRefine { shape, tess } => {
            let mesh = refine(&shape, &tess, Some(cancel))?;
            Ok(JobOutput::Refined(Refined { mesh }))
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("kernel panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("kernel panicked: {s}")
    } else {
        "kernel panicked".to_string()
    }
}

/// Runs `job` to its reply.
///
/// Stage errors and panics become an `Err` reply. Returns `None` when the job
/// was cancelled, before it started or while it ran.
pub fn dispatch<E: Execute + ?Sized>(
    executor: &mut E,
    job: Job,
    cancel: &CancelToken,
) -> Option<JobResult> {
    let Job { id, command } = job;
    if cancel.is_cancelled() {
        tracing::debug!(%id, "skipping cancelled job");
        return None;
    }

    let cmd = command.tag();
    tracing::debug!(%id, cmd, "dispatching job");
    let outcome = catch_unwind(AssertUnwindSafe(|| executor.execute(command, cancel)))
        .unwrap_or_else(|payload| Err(KernelError::Kernel(panic_message(payload))));

    if cancel.is_cancelled() {
        tracing::debug!(%id, cmd, "job cancelled, reply suppressed");
        return None;
    }
    match outcome {
        Ok(result) => Some(JobResult::Ok { id, result }),
        Err(KernelError::Cancelled) => None,
        Err(error) => {
            tracing::warn!(%id, cmd, %error, "job failed");
            Some(JobResult::Err {
                id,
                error: Some(error.to_string()),
            })
        },
    }
}

/// Decodes and runs a raw request.
///
/// Undecodable requests with a readable id get an `Err` reply; without one
/// they are logged and dropped. `CANCEL` never gets a reply; the caller's
/// reader is expected to have flipped the job's token already.
pub fn dispatch_value<E: Execute + ?Sized>(
    executor: &mut E,
    value: Value,
    cancel: &CancelToken,
) -> Option<JobResult> {
    match decode_request(value) {
        Ok(Request::Job(job)) => dispatch(executor, job, cancel),
        Ok(Request::Cancel(id)) => {
            tracing::debug!(%id, "cancel request reached a worker, ignored");
            None
        },
        Err(rejected) => reject(rejected),
    }
}

fn reject(Rejected { id, error }: Rejected) -> Option<JobResult> {
    match id {
        Some(id) => {
            tracing::warn!(%id, %error, "rejecting request");
            Some(JobResult::Err {
                id,
                error: Some(error.to_string()),
            })
        },
        None => {
            tracing::warn!(%error, "dropping request without a readable id");
            None
        },
    }
}
