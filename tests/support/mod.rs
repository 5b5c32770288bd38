//! Test support library
//! Provides shared fixtures & executors for the integration tests.
#![allow(dead_code)]

use padkernel::cancel::CancelToken;
use padkernel::errors::KernelError;
use padkernel::float_types::Real;
use padkernel::job::dispatcher::{Execute, run};
use padkernel::job::{Command, JobOutput};
use padkernel::{CSGOps, Profile, Solid};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// 2×2 square with a centred 1×1 hole, both given counter-clockwise.
pub fn square_with_hole() -> Profile {
    Profile::from_coords(
        &[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]],
        &[&[[0.5, 0.5], [1.5, 0.5], [1.5, 1.5], [0.5, 1.5]]],
    )
}

/// Axis-aligned cube of edge `size` with its minimum corner at `(x, y, z)`.
pub fn cube_at(x: Real, y: Real, z: Real, size: Real) -> Solid {
    Solid::cuboid(size, size, size).translate(x, y, z)
}

/// Runs the real kernel after sleeping, counting the jobs it actually ran.
#[derive(Clone, Default)]
pub struct SlowExecutor {
    pub delay: Duration,
    pub ran: Arc<AtomicUsize>,
}

impl SlowExecutor {
    pub fn new(delay: Duration) -> Self {
        SlowExecutor {
            delay,
            ran: Arc::default(),
        }
    }

    pub fn ran(&self) -> usize {
        self.ran.load(Ordering::SeqCst)
    }
}

impl Execute for SlowExecutor {
    fn execute(
        &mut self,
        command: Command,
        cancel: &CancelToken,
    ) -> Result<JobOutput, KernelError> {
        std::thread::sleep(self.delay);
        self.ran.fetch_add(1, Ordering::SeqCst);
        run(command, cancel)
    }
}
