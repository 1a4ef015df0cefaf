//! Background task management for non-blocking operations.
//!
//! Imports run on background threads so the UI thread never blocks on a
//! network stage. Each task reports over an mpsc channel and honors a
//! shared cancellation flag checked between items.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

/// Unique identifier for a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TaskId(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Batch import from the media index.
    BatchImport,
    /// Import of externally shared images with per-item categories.
    ShareImport,
    /// Library list / counter reload.
    LibraryRefresh,
}

impl TaskType {
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskType::BatchImport => "Batch Import",
            TaskType::ShareImport => "Share Import",
            TaskType::LibraryRefresh => "Library Refresh",
        }
    }
}

/// Progress information for a task.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub current: usize,
    pub total: usize,
    pub current_item: Option<String>,
    pub message: Option<String>,
}

impl TaskProgress {
    pub fn new(current: usize, total: usize) -> Self {
        Self {
            current,
            total,
            current_item: None,
            message: None,
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.current_item = Some(item.into());
        self
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Progress percentage (0-100).
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            ((self.current as f64 / self.total as f64) * 100.0).min(100.0) as u8
        }
    }
}

/// State of a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

/// Update messages sent from background tasks via channels.
#[derive(Debug, Clone)]
pub enum TaskUpdate {
    /// Task has started with total items to process.
    Started { total: usize },
    /// Progress update during processing.
    Progress(TaskProgress),
    /// Task completed; the message summarizes the outcome.
    Completed { message: String },
    /// Task was cancelled.
    Cancelled,
    /// Task failed before producing a result.
    Failed { error: String },
}

/// A running background task with its state and communication channels.
pub struct BackgroundTask {
    pub id: TaskId,
    pub task_type: TaskType,
    pub state: TaskState,
    pub progress: Option<TaskProgress>,
    pub cancel_flag: Arc<AtomicBool>,
    pub receiver: mpsc::Receiver<TaskUpdate>,
    pub started_at: Instant,
}

impl BackgroundTask {
    pub fn new(
        task_type: TaskType,
        cancel_flag: Arc<AtomicBool>,
        receiver: mpsc::Receiver<TaskUpdate>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            state: TaskState::Running,
            progress: None,
            cancel_flag,
            receiver,
            started_at: Instant::now(),
        }
    }

    /// Request cancellation. The running pipeline stops before starting
    /// its next item; an item already mid-flight completes.
    pub fn cancel(&self) {
        self.cancel_flag
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}

/// Result of polling task updates.
#[derive(Debug, Clone)]
pub struct TaskCompletionInfo {
    pub id: TaskId,
    pub task_type: TaskType,
    pub message: String,
    pub success: bool,
}

/// Tracks all background tasks, providing centralized control and status.
pub struct BackgroundTaskManager {
    tasks: HashMap<TaskId, BackgroundTask>,
    task_order: Vec<TaskId>,
}

impl BackgroundTaskManager {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            task_order: Vec::new(),
        }
    }

    /// Register a new background task. Returns the id, a sender for the
    /// task to report over, and its cancellation flag.
    pub fn register_task(
        &mut self,
        task_type: TaskType,
    ) -> (TaskId, mpsc::Sender<TaskUpdate>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let task = BackgroundTask::new(task_type, cancel_flag.clone(), rx);
        let id = task.id;

        self.tasks.insert(id, task);
        self.task_order.push(id);

        (id, tx, cancel_flag)
    }

    /// Check if a task of the given type is already running.
    pub fn is_running(&self, task_type: TaskType) -> bool {
        self.tasks
            .values()
            .any(|t| t.task_type == task_type && t.is_running())
    }

    /// Cancel a specific task by id.
    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        if let Some(task) = self.tasks.get(&id) {
            if task.is_running() {
                task.cancel();
                return true;
            }
        }
        false
    }

    /// Cancel all running tasks.
    pub fn cancel_all(&mut self) {
        for task in self.tasks.values() {
            if task.is_running() {
                task.cancel();
            }
        }
    }

    /// Drain all task channels. Returns completion info for tasks that
    /// finished since the last poll; finished tasks are dropped from
    /// tracking.
    pub fn poll_updates(&mut self) -> Vec<TaskCompletionInfo> {
        let mut completed = Vec::new();

        let task_ids: Vec<TaskId> = self.tasks.keys().copied().collect();

        for id in task_ids {
            if let Some(task) = self.tasks.get_mut(&id) {
                while let Ok(update) = task.receiver.try_recv() {
                    match update {
                        TaskUpdate::Started { total } => {
                            task.progress = Some(TaskProgress::new(0, total));
                        }
                        TaskUpdate::Progress(progress) => {
                            task.progress = Some(progress);
                        }
                        TaskUpdate::Completed { message } => {
                            task.state = TaskState::Completed;
                            completed.push(TaskCompletionInfo {
                                id,
                                task_type: task.task_type,
                                message,
                                success: true,
                            });
                        }
                        TaskUpdate::Cancelled => {
                            task.state = TaskState::Cancelled;
                            completed.push(TaskCompletionInfo {
                                id,
                                task_type: task.task_type,
                                message: "Cancelled".to_string(),
                                success: false,
                            });
                        }
                        TaskUpdate::Failed { error } => {
                            task.state = TaskState::Failed(error.clone());
                            completed.push(TaskCompletionInfo {
                                id,
                                task_type: task.task_type,
                                message: error,
                                success: false,
                            });
                        }
                    }
                }
            }
        }

        for info in &completed {
            self.tasks.remove(&info.id);
            self.task_order.retain(|id| *id != info.id);
        }

        completed
    }

    /// All running tasks, in registration order.
    pub fn running_tasks(&self) -> Vec<&BackgroundTask> {
        self.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.is_running())
            .collect()
    }

    pub fn has_running_tasks(&self) -> bool {
        self.tasks.values().any(|t| t.is_running())
    }
}

impl Default for BackgroundTaskManager {
    fn default() -> Self {
        Self::new()
    }
}
