//! Client configuration, with defaults overridable from the environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Settings for a [`KernelClient`](crate::job::client::KernelClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Default time a job may take before the caller gives up (ms).
    pub timeout_ms: u64,
    /// Jobs that may be queued or running on the worker side at once.
    pub max_in_flight: usize,
    /// Worker threads; jobs are spread over them round-robin.
    pub workers: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 6000,
            max_in_flight: 64,
            workers: 1,
        }
    }
}

impl KernelConfig {
    /// Load configuration from `PADKERNEL_TIMEOUT_MS`,
    /// `PADKERNEL_MAX_IN_FLIGHT` and `PADKERNEL_WORKERS`.
    ///
    /// Missing variables keep their default; unparsable or zero values are
    /// logged and also keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: read(&lookup, "PADKERNEL_TIMEOUT_MS", defaults.timeout_ms),
            max_in_flight: read(&lookup, "PADKERNEL_MAX_IN_FLIGHT", defaults.max_in_flight),
            workers: read(&lookup, "PADKERNEL_WORKERS", defaults.workers),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + PartialEq + From<u8> + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::from(0) => value,
        _ => {
            tracing::warn!(%key, value = %raw, %default, "ignoring invalid setting");
            default
        },
    }
}
