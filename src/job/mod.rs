//! Asynchronous request/response protocol running the kernel off the
//! caller's thread.
//!
//! A caller builds a [`KernelClient`](client::KernelClient) and submits
//! [`Command`](protocol::Command)s. Each job is handed to a dedicated worker
//! thread, which runs it with the [`dispatcher`] and answers with exactly one
//! [`JobResult`](protocol::JobResult) unless the job was cancelled.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod stdio;
pub mod worker;

pub use client::KernelClient;
pub use config::KernelConfig;
pub use protocol::{Command, JobId, JobOutput, JobResult};
