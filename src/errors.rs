//! Kernel errors

use crate::float_types::Real;
use crate::job::protocol::JobId;
use std::fmt::Display;

/// Which loop of a profile an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Outer,
    Hole(usize),
}

impl Display for LoopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopKind::Outer => write!(f, "outer loop"),
            LoopKind::Hole(i) => write!(f, "hole {}", i),
        }
    }
}

/// All the failures a kernel stage or the job client can report.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// (DegenerateLoop) A loop has fewer than 3 points, or no area, after deduplication
    #[error("(DegenerateLoop) {kind} has {points} usable points, at least 3 enclosing an area are required")]
    DegenerateLoop { kind: LoopKind, points: usize },

    /// (SelfIntersection) The outer loop is not simple
    #[error("(SelfIntersection) {kind} self-intersects near ({x}, {y})")]
    SelfIntersection { kind: LoopKind, x: Real, y: Real },

    /// (InvalidCoordinate) A coordinate is NaN or infinite
    #[error("(InvalidCoordinate) {kind} has a NaN or infinite coordinate at index {index}")]
    InvalidCoordinate { kind: LoopKind, index: usize },

    /// (InvalidHeight) Extrusion height must be finite and strictly positive
    #[error("(InvalidHeight) extrusion height must be positive, got {0}")]
    InvalidHeight(Real),

    /// (InvalidTessellation) A tessellation hint is not finite and positive
    #[error("(InvalidTessellation) {name} must be finite and positive, got {value}")]
    InvalidTessellation { name: &'static str, value: Real },

    /// (BooleanOperation) An input of a boolean op is not a valid closed solid
    #[error("(BooleanOperation) operand {operand} is not a valid closed solid: {reason}")]
    BooleanOperation { operand: char, reason: String },

    /// A solid's wire form could not be decoded
    #[error("(InvalidSolid) {0}")]
    InvalidSolid(String),

    /// No response arrived within the timeout window
    #[error("Worker timeout")]
    Timeout,

    /// A job carried a command tag the execution context does not know
    #[error("Unknown cmd: {0}")]
    UnknownCommand(String),

    /// The execution context reported a failure for this job
    #[error("{0}")]
    Kernel(String),

    /// Another job with the same id is still in flight
    #[error("job {0} is already in flight")]
    DuplicateJob(JobId),

    /// Every job slot is taken
    #[error("kernel busy: {0} jobs in flight")]
    Busy(usize),

    /// The job was abandoned before it finished
    #[error("job cancelled")]
    Cancelled,

    /// The execution context is gone
    #[error("kernel execution context disconnected")]
    Disconnected,

    /// A wire message could not be (de)serialized
    #[error("wire format error: {0}")]
    Wire(#[from] serde_json::Error),
}

impl KernelError {
    /// Builds the caller-side error for a failed reply, falling back to the
    /// generic message when the execution context sent none.
    pub fn from_reply(error: Option<String>) -> Self {
        match error {
            Some(message) if !message.is_empty() => KernelError::Kernel(message),
            _ => KernelError::Kernel("Kernel error".to_string()),
        }
    }
}
