//! Bounded-concurrency conversion queue
//!
//! Tasks start in FIFO order while fewer than `concurrency` are processing and
//! the queue is not paused. Each started task runs on its own Tokio task, and
//! every settlement schedules the next round. Queue state sits behind one
//! mutex that is never held across an await or an observer callback.
//!
//! Every start bumps a per-task generation. A settlement whose generation no
//! longer matches (the task was cancelled, removed or restarted meanwhile) is
//! ignored.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::history::{HistoryRecord, ResultStore};
use super::observer::{NoOpObserver, TaskObserver};
use super::runner::TaskRunner;
use super::types::{
    ConversionTask, ProgressStage, QueueSnapshot, TaskPayload, TaskStats, TaskStatus,
};
use crate::config::ConversionOptions;
use crate::config::builder::DEFAULT_CONCURRENCY;
use crate::error::{QueueError, QueueResult};
use crate::markdown_converter::ConversionResult;

struct TaskEntry {
    task: ConversionTask,
    observer: Arc<dyn TaskObserver>,
    generation: u64,
}

#[derive(Default)]
struct QueueState {
    tasks: HashMap<String, TaskEntry>,
    /// Task ids in insertion order
    insertion: Vec<String>,
    /// Pending task ids waiting for dispatch
    ready: VecDeque<String>,
    processing: usize,
    paused: bool,
}

impl QueueState {
    fn stats(&self) -> TaskStats {
        let mut stats = TaskStats {
            total: self.tasks.len(),
            paused: self.paused,
            ..TaskStats::default()
        };
        for entry in self.tasks.values() {
            match entry.task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    fn is_idle(&self) -> bool {
        self.processing == 0 && (self.paused || self.ready.is_empty())
    }

    fn insert(&mut self, task: ConversionTask, observer: Arc<dyn TaskObserver>) {
        let id = task.id.clone();
        if task.status == TaskStatus::Pending && !task.cancelled {
            self.ready.push_back(id.clone());
        }
        self.insertion.push(id.clone());
        self.tasks.insert(
            id,
            TaskEntry {
                task,
                observer,
                generation: 0,
            },
        );
    }
}

struct Dispatch {
    id: String,
    generation: u64,
    task: ConversionTask,
    observer: Arc<dyn TaskObserver>,
}

struct Inner {
    state: Mutex<QueueState>,
    runner: Arc<dyn TaskRunner>,
    store: Option<Arc<dyn ResultStore>>,
    concurrency: usize,
    idle: Notify,
}

/// Conversion task queue. Cheap to clone; clones share one queue.
///
/// Methods that may start tasks must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("concurrency", &self.inner.concurrency)
            .field("stats", &self.stats())
            .finish()
    }
}

impl TaskQueue {
    /// Create a queue running at most `concurrency` tasks at once (0 means the default).
    #[must_use]
    pub fn new(runner: Arc<dyn TaskRunner>, concurrency: usize) -> Self {
        Self::build(runner, concurrency, None)
    }

    /// Like [`TaskQueue::new`], appending every settled task to `store`.
    #[must_use]
    pub fn with_store(runner: Arc<dyn TaskRunner>, concurrency: usize, store: Arc<dyn ResultStore>) -> Self {
        Self::build(runner, concurrency, Some(store))
    }

    fn build(runner: Arc<dyn TaskRunner>, concurrency: usize, store: Option<Arc<dyn ResultStore>>) -> Self {
        let concurrency = if concurrency == 0 { DEFAULT_CONCURRENCY } else { concurrency };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                runner,
                store,
                concurrency,
                idle: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Queue one conversion and start it if a slot is free.
    pub fn add_task(
        &self,
        payload: TaskPayload,
        options: ConversionOptions,
        observer: Option<Arc<dyn TaskObserver>>,
    ) -> ConversionTask {
        let observer = observer.unwrap_or_else(|| Arc::new(NoOpObserver));
        let task = ConversionTask::new(payload, options);
        log::debug!("Queued task {} for {}", task.id, task.payload.label());
        self.inner.state.lock().insert(task.clone(), Arc::clone(&observer));
        observer.on_progress(&task, ProgressStage::Queued);
        self.pump();
        task
    }

    /// Queue many conversions sharing one options value and observer.
    pub fn add_batch(
        &self,
        items: Vec<TaskPayload>,
        options: ConversionOptions,
        observer: Option<Arc<dyn TaskObserver>>,
    ) -> Vec<ConversionTask> {
        let observer = observer.unwrap_or_else(|| Arc::new(NoOpObserver));
        let tasks: Vec<ConversionTask> = items
            .into_iter()
            .map(|payload| ConversionTask::new(payload, options.clone()))
            .collect();
        {
            let mut state = self.inner.state.lock();
            for task in &tasks {
                state.insert(task.clone(), Arc::clone(&observer));
            }
        }
        log::info!("Queued batch of {} tasks", tasks.len());
        for task in &tasks {
            observer.on_progress(task, ProgressStage::Queued);
        }
        self.pump();
        tasks
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> TaskStats {
        self.inner.state.lock().stats()
    }

    #[must_use]
    pub fn get_task(&self, id: &str) -> Option<ConversionTask> {
        self.inner.state.lock().tasks.get(id).map(|entry| entry.task.clone())
    }

    /// All tasks in insertion order
    #[must_use]
    pub fn list_tasks(&self) -> Vec<ConversionTask> {
        let state = self.inner.state.lock();
        state
            .insertion
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|entry| entry.task.clone())
            .collect()
    }

    /// Resolve once nothing is processing and nothing is ready to start.
    ///
    /// A paused queue with nothing processing counts as idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Stop starting new tasks. Running tasks finish normally.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        state.paused = true;
        log::info!("Task queue paused ({} processing)", state.processing);
        if state.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }

    pub fn resume(&self) {
        self.inner.state.lock().paused = false;
        log::info!("Task queue resumed");
        self.pump();
    }

    /// Put a pending or processing task back to pending and hold it from dispatch.
    ///
    /// A processing task is not interrupted; its eventual settlement is ignored.
    /// Use [`TaskQueue::requeue_task`] to make it eligible again.
    pub fn cancel_task(&self, id: &str) -> QueueResult<ConversionTask> {
        let task = {
            let mut state = self.inner.state.lock();
            let entry = state
                .tasks
                .get_mut(id)
                .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
            let was_processing = match entry.task.status {
                TaskStatus::Pending => false,
                TaskStatus::Processing => true,
                other => {
                    return Err(QueueError::InvalidTransition {
                        id: id.to_string(),
                        from: other.to_string(),
                        to: TaskStatus::Pending.to_string(),
                    });
                }
            };
            entry.task.status = TaskStatus::Pending;
            entry.task.cancelled = true;
            entry.generation += 1;
            let task = entry.task.clone();
            if was_processing {
                state.processing -= 1;
            }
            state.ready.retain(|ready| ready != id);
            task
        };
        log::info!("Cancelled task {id}");
        self.pump();
        Ok(task)
    }

    /// Make a cancelled task eligible for dispatch again.
    pub fn requeue_task(&self, id: &str) -> QueueResult<ConversionTask> {
        let task = {
            let mut state = self.inner.state.lock();
            let entry = state
                .tasks
                .get_mut(id)
                .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
            if entry.task.status != TaskStatus::Pending || !entry.task.cancelled {
                return Err(QueueError::InvalidTransition {
                    id: id.to_string(),
                    from: entry.task.status.to_string(),
                    to: TaskStatus::Pending.to_string(),
                });
            }
            entry.task.cancelled = false;
            let task = entry.task.clone();
            state.ready.push_back(id.to_string());
            task
        };
        self.pump();
        Ok(task)
    }

    /// Send a failed task back to pending.
    pub fn retry_task(&self, id: &str) -> QueueResult<ConversionTask> {
        let (task, observer) = {
            let mut state = self.inner.state.lock();
            let entry = state
                .tasks
                .get_mut(id)
                .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
            if entry.task.status != TaskStatus::Failed {
                return Err(QueueError::InvalidTransition {
                    id: id.to_string(),
                    from: entry.task.status.to_string(),
                    to: TaskStatus::Pending.to_string(),
                });
            }
            entry.task.status = TaskStatus::Pending;
            entry.task.error = None;
            entry.task.result = None;
            entry.task.completed_at = None;
            let snapshot = (entry.task.clone(), Arc::clone(&entry.observer));
            state.ready.push_back(id.to_string());
            snapshot
        };
        log::info!("Retrying task {id} (attempt {})", task.attempts + 1);
        observer.on_progress(&task, ProgressStage::Queued);
        self.pump();
        Ok(task)
    }

    /// Drop a task in any state. A processing task's settlement is ignored.
    pub fn remove_task(&self, id: &str) -> QueueResult<ConversionTask> {
        let entry = {
            let mut state = self.inner.state.lock();
            let entry = state
                .tasks
                .remove(id)
                .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
            if entry.task.status == TaskStatus::Processing {
                state.processing -= 1;
            }
            state.ready.retain(|ready| ready != id);
            state.insertion.retain(|known| known != id);
            entry
        };
        log::debug!("Removed task {id}");
        self.pump();
        Ok(entry.task)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tasks: self.list_tasks(),
            paused: self.inner.state.lock().paused,
            exported_at: Utc::now(),
        }
    }

    /// Serialize every task and the pause flag as JSON.
    pub fn export_state(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Merge tasks from an exported snapshot. Tasks whose id is already known
    /// are skipped; tasks that were processing come back as pending.
    /// Returns the number of tasks added.
    pub fn import_state(&self, json: &str) -> QueueResult<usize> {
        let snapshot: QueueSnapshot = serde_json::from_str(json)?;
        let added = {
            let mut state = self.inner.state.lock();
            let mut added = 0;
            for mut task in snapshot.tasks {
                if state.tasks.contains_key(&task.id) {
                    log::debug!("Skipping imported task {}: id already queued", task.id);
                    continue;
                }
                if task.status == TaskStatus::Processing {
                    task.status = TaskStatus::Pending;
                }
                state.insert(task, Arc::new(NoOpObserver));
                added += 1;
            }
            state.paused = snapshot.paused;
            added
        };
        log::info!("Imported {added} tasks");
        self.pump();
        Ok(added)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Start ready tasks while slots are free.
    fn pump(&self) {
        let dispatches = {
            let mut state = self.inner.state.lock();
            let mut dispatches = Vec::new();
            while !state.paused && state.processing < self.inner.concurrency {
                let Some(id) = state.ready.pop_front() else {
                    break;
                };
                let Some(entry) = state.tasks.get_mut(&id) else {
                    continue;
                };
                if entry.task.status != TaskStatus::Pending || entry.task.cancelled {
                    continue;
                }
                entry.task.status = TaskStatus::Processing;
                entry.task.attempts += 1;
                entry.generation += 1;
                let dispatch = Dispatch {
                    id: id.clone(),
                    generation: entry.generation,
                    task: entry.task.clone(),
                    observer: Arc::clone(&entry.observer),
                };
                state.processing += 1;
                dispatches.push(dispatch);
            }
            if dispatches.is_empty() && state.is_idle() {
                self.inner.idle.notify_waiters();
            }
            dispatches
        };

        for dispatch in dispatches {
            log::debug!("Starting task {} (attempt {})", dispatch.id, dispatch.task.attempts);
            dispatch.observer.on_progress(&dispatch.task, ProgressStage::Started);
            let queue = self.clone();
            tokio::spawn(async move {
                queue.execute(dispatch).await;
            });
        }
    }

    async fn execute(&self, dispatch: Dispatch) {
        let runner = Arc::clone(&self.inner.runner);
        let payload = dispatch.task.payload.clone();
        let options = dispatch.task.options.clone();

        // Inner spawn so a panicking conversion surfaces as a JoinError
        let outcome = tokio::spawn(async move { runner.run(&payload, &options).await }).await;
        let outcome = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(join_error) if join_error.is_panic() => {
                Err(format!("Conversion panicked: {}", panic_message(join_error.into_panic())))
            }
            Err(join_error) => Err(format!("Conversion task aborted: {join_error}")),
        };

        self.settle(&dispatch.id, dispatch.generation, outcome);
        self.pump();
    }

    fn settle(&self, id: &str, generation: u64, outcome: Result<ConversionResult, String>) {
        let settled = {
            let mut state = self.inner.state.lock();
            let Some(entry) = state.tasks.get_mut(id) else {
                log::debug!("Ignoring settlement of removed task {id}");
                return;
            };
            if entry.generation != generation || entry.task.status != TaskStatus::Processing {
                log::debug!("Ignoring stale settlement of task {id}");
                return;
            }
            match outcome {
                Ok(result) => {
                    entry.task.status = TaskStatus::Completed;
                    entry.task.result = Some(result);
                    entry.task.error = None;
                }
                Err(message) => {
                    entry.task.status = TaskStatus::Failed;
                    entry.task.error = Some(message);
                }
            }
            entry.task.completed_at = Some(Utc::now());
            let settled = (entry.task.clone(), Arc::clone(&entry.observer));
            state.processing -= 1;
            settled
        };

        let (task, observer) = settled;
        observer.on_progress(&task, ProgressStage::Finished);
        match (&task.status, &task.error) {
            (TaskStatus::Failed, Some(error)) => {
                log::warn!("Task {} failed: {error}", task.id);
                observer.on_error(&task, error);
            }
            _ => {
                log::info!("Task {} completed", task.id);
                observer.on_complete(&task);
            }
        }
        if let Some(store) = &self.inner.store {
            store.append(HistoryRecord::from_task(&task));
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvertError, ConvertResult};
    use futures::future::BoxFuture;
    use std::time::Duration;

    /// Fails payloads whose label contains "fail", panics on "panic".
    struct ScriptedRunner;

    impl TaskRunner for ScriptedRunner {
        fn run<'a>(
            &'a self,
            payload: &'a TaskPayload,
            _options: &'a ConversionOptions,
        ) -> BoxFuture<'a, ConvertResult<ConversionResult>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let label = payload.label();
                if label.contains("panic") {
                    panic!("scripted panic");
                }
                if label.contains("fail") {
                    return Err(ConvertError::Other(format!("scripted failure for {label}")));
                }
                Ok(ConversionResult {
                    markdown: label.clone(),
                    title: label,
                    source_url: None,
                    timestamp: Utc::now(),
                    metadata: Default::default(),
                    images: Vec::new(),
                })
            })
        }
    }

    fn new_queue() -> TaskQueue {
        TaskQueue::new(Arc::new(ScriptedRunner), 2)
    }

    #[tokio::test]
    async fn test_completes_and_fails() {
        let queue = new_queue();
        let ok = queue.add_task(TaskPayload::url("https://ok"), ConversionOptions::default(), None);
        let bad = queue.add_task(TaskPayload::url("https://fail"), ConversionOptions::default(), None);
        queue.wait_idle().await;

        let ok = queue.get_task(&ok.id).expect("task exists");
        assert_eq!(ok.status, TaskStatus::Completed);
        assert_eq!(ok.result.as_ref().map(|r| r.markdown.as_str()), Some("https://ok"));
        assert!(ok.completed_at.is_some());

        let bad = queue.get_task(&bad.id).expect("task exists");
        assert_eq!(bad.status, TaskStatus::Failed);
        assert!(bad.error.as_deref().is_some_and(|e| e.contains("scripted failure")));
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_failure() {
        let queue = new_queue();
        let task = queue.add_task(TaskPayload::url("https://panic"), ConversionOptions::default(), None);
        queue.wait_idle().await;
        let task = queue.get_task(&task.id).expect("task exists");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().is_some_and(|e| e.contains("scripted panic")));
    }

    #[tokio::test]
    async fn test_retry_only_from_failed() {
        let queue = new_queue();
        let ok = queue.add_task(TaskPayload::url("https://ok"), ConversionOptions::default(), None);
        queue.wait_idle().await;
        assert!(matches!(
            queue.retry_task(&ok.id),
            Err(QueueError::InvalidTransition { .. })
        ));
        assert!(matches!(queue.retry_task("nope"), Err(QueueError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_pause_holds_dispatch_and_resume_drains() {
        let queue = new_queue();
        queue.pause();
        let tasks = queue.add_batch(
            (0..3).map(|i| TaskPayload::url(format!("https://ok/{i}"))).collect(),
            ConversionOptions::default(),
            None,
        );
        queue.wait_idle().await;
        assert_eq!(queue.stats().pending, 3);
        assert!(queue.stats().paused);

        queue.resume();
        queue.wait_idle().await;
        assert_eq!(queue.stats().completed, 3);
        let listed: Vec<String> = queue.list_tasks().into_iter().map(|t| t.id).collect();
        let queued: Vec<String> = tasks.into_iter().map(|t| t.id).collect();
        assert_eq!(listed, queued);
    }

    #[tokio::test]
    async fn test_cancel_parks_and_requeue_runs() {
        let queue = new_queue();
        queue.pause();
        let task = queue.add_task(TaskPayload::url("https://ok"), ConversionOptions::default(), None);
        let cancelled = queue.cancel_task(&task.id).expect("cancellable");
        assert!(cancelled.cancelled);
        queue.resume();
        queue.wait_idle().await;
        assert_eq!(queue.get_task(&task.id).map(|t| t.status), Some(TaskStatus::Pending));

        queue.requeue_task(&task.id).expect("requeue");
        queue.wait_idle().await;
        assert_eq!(queue.get_task(&task.id).map(|t| t.status), Some(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_export_import_resets_processing() {
        let queue = new_queue();
        queue.pause();
        queue.add_task(TaskPayload::url("https://ok/a"), ConversionOptions::default(), None);
        let json = queue.export_state().expect("exports");

        let other = new_queue();
        other.pause();
        assert_eq!(other.import_state(&json).expect("imports"), 1);
        assert_eq!(other.import_state(&json).expect("imports again"), 0);
        assert_eq!(other.stats().pending, 1);
        assert!(other.import_state("{").is_err());
    }
}
