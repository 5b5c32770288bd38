use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag marking a job as abandoned by its caller.
///
/// Clones observe the same flag. Cancelling is advisory: stages poll it at
/// their own checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
