//! Task lifecycle notifications

use super::types::{ConversionTask, ProgressStage};

/// Receives every outcome of the tasks it was registered with.
///
/// Callbacks run on the queue's worker tasks, never while queue state is locked,
/// so implementations may call back into the queue.
pub trait TaskObserver: Send + Sync {
    /// A task was queued, started or finished
    fn on_progress(&self, task: &ConversionTask, stage: ProgressStage);

    /// A task completed with a result attached
    fn on_complete(&self, task: &ConversionTask);

    /// A task failed with the error message attached
    fn on_error(&self, task: &ConversionTask, error: &str);
}

/// Observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl TaskObserver for NoOpObserver {
    #[inline(always)]
    fn on_progress(&self, _task: &ConversionTask, _stage: ProgressStage) {}

    #[inline(always)]
    fn on_complete(&self, _task: &ConversionTask) {}

    #[inline(always)]
    fn on_error(&self, _task: &ConversionTask, _error: &str) {}
}
