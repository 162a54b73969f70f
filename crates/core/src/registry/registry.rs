//! In-memory task registry.
//!
//! The single source of truth for task status, progress and results. All
//! mutations go through `&self` methods holding the write lock, which
//! serializes writers per task; reads return cloned snapshots. Records are
//! deliberately not persisted across restarts.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

use super::types::{Task, TaskFailure, TaskKind, TaskResult, TaskStatus};

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Task not found.
    #[error("Task not found: {0}")]
    NotFound(String),
}

/// In-memory mapping from task id to task state.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new queued task and return its snapshot.
    pub fn create(&self, kind: TaskKind) -> Task {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            kind,
            status: TaskStatus::Queued,
            progress: 0,
            stage: "queued".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            temp_artifacts: Vec::new(),
        };

        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        tasks.insert(task.id.clone(), task.clone());
        task
    }

    /// Snapshot of one task.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Snapshot of all tasks, newest first.
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Number of tasks that are not yet terminal.
    pub fn active_count(&self) -> usize {
        self.tasks
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|t| !t.is_terminal())
            .count()
    }

    /// Ids of all known tasks (used by the janitor's orphan sweep).
    pub fn known_ids(&self) -> HashSet<String> {
        self.tasks
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Transition a queued task to running.
    ///
    /// Returns false when the task already left the queued state (e.g. it was
    /// cancelled before the worker picked it up).
    pub fn mark_running(&self, id: &str) -> Result<bool, RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if task.status != TaskStatus::Queued {
            return Ok(false);
        }
        task.status = TaskStatus::Running;
        task.stage = "starting".to_string();
        Ok(true)
    }

    /// Update progress and stage.
    ///
    /// A no-op once the task is terminal (guards against late callbacks from
    /// a just-killed process); progress is clamped monotonic.
    pub fn update_progress(
        &self,
        id: &str,
        percent: u8,
        stage: &str,
    ) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if task.is_terminal() {
            return Ok(());
        }
        task.progress = task.progress.max(percent.min(100));
        task.stage = stage.to_string();
        Ok(())
    }

    /// Record a temp artifact owned by the task.
    pub fn add_temp_artifact(&self, id: &str, path: PathBuf) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        task.temp_artifacts.push(path);
        Ok(())
    }

    /// Transition to completed with a result payload.
    ///
    /// Returns false when another writer already reached a terminal state
    /// (first terminal transition wins).
    pub fn complete(&self, id: &str, result: TaskResult) -> Result<bool, RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if task.is_terminal() {
            return Ok(false);
        }
        task.status = TaskStatus::Completed;
        task.progress = 100;
        task.stage = "completed".to_string();
        task.result = Some(result);
        task.completed_at = Some(Utc::now());
        Ok(true)
    }

    /// Transition to failed with a structured failure record.
    ///
    /// Returns false when another writer already reached a terminal state.
    pub fn fail(&self, id: &str, failure: TaskFailure) -> Result<bool, RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if task.is_terminal() {
            return Ok(false);
        }
        task.status = TaskStatus::Failed;
        task.stage = "failed".to_string();
        task.error = Some(failure);
        task.completed_at = Some(Utc::now());
        Ok(true)
    }

    /// Remove a task record, returning it.
    pub fn delete(&self, id: &str) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().expect("registry lock poisoned");
        tasks
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Terminal tasks whose retention window ended before `now`.
    pub fn expired(&self, retention: Duration, now: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|task| {
                task.is_terminal()
                    && task
                        .completed_at
                        .map(|done| done + retention < now)
                        .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::FailureKind;

    fn download_result() -> TaskResult {
        TaskResult::Download {
            output_file: PathBuf::from("/results/x/video.mp4"),
            file_size_bytes: 10,
            duration_secs: 1.0,
            title: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);

        let fetched = registry.get(&task.id).unwrap();
        assert_eq!(fetched.status, TaskStatus::Queued);
        assert_eq!(fetched.progress, 0);
        assert!(fetched.result.is_none());
        assert!(fetched.error.is_none());
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Download);

        assert!(registry.mark_running(&task.id).unwrap());
        registry.update_progress(&task.id, 40, "downloading").unwrap();
        assert!(registry.complete(&task.id, download_result()).unwrap());

        let done = registry.get(&task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.result.is_some());
        assert!(done.error.is_none());
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);
        registry.mark_running(&task.id).unwrap();

        registry.update_progress(&task.id, 50, "stage b").unwrap();
        registry.update_progress(&task.id, 30, "stage a").unwrap();

        let snapshot = registry.get(&task.id).unwrap();
        assert_eq!(snapshot.progress, 50);
        // Stage text still follows the latest caller.
        assert_eq!(snapshot.stage, "stage a");
    }

    #[test]
    fn test_progress_noop_after_terminal() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);
        registry.mark_running(&task.id).unwrap();
        registry
            .fail(&task.id, TaskFailure::new(FailureKind::Timeout, "budget"))
            .unwrap();

        registry.update_progress(&task.id, 99, "late callback").unwrap();

        let snapshot = registry.get(&task.id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.stage, "failed");
        assert_ne!(snapshot.progress, 99);
    }

    #[test]
    fn test_first_terminal_transition_wins() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);
        registry.mark_running(&task.id).unwrap();

        assert!(registry
            .fail(&task.id, TaskFailure::new(FailureKind::Cancelled, "client"))
            .unwrap());
        // The worker's completion arrives second and is discarded.
        assert!(!registry.complete(&task.id, download_result()).unwrap());

        let snapshot = registry.get(&task.id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.error.as_ref().unwrap().kind, FailureKind::Cancelled);
    }

    #[test]
    fn test_result_error_exclusive() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Download);
        registry.mark_running(&task.id).unwrap();
        registry.complete(&task.id, download_result()).unwrap();

        assert!(!registry
            .fail(&task.id, TaskFailure::new(FailureKind::Internal, "late"))
            .unwrap());
        let snapshot = registry.get(&task.id).unwrap();
        assert!(snapshot.result.is_some());
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_mark_running_only_from_queued() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);
        registry
            .fail(&task.id, TaskFailure::new(FailureKind::Cancelled, "queued cancel"))
            .unwrap();
        // The worker loses the race and must not start.
        assert!(!registry.mark_running(&task.id).unwrap());
    }

    #[test]
    fn test_active_count() {
        let registry = TaskRegistry::new();
        let a = registry.create(TaskKind::Composition);
        let _b = registry.create(TaskKind::Download);
        assert_eq!(registry.active_count(), 2);

        registry.mark_running(&a.id).unwrap();
        assert_eq!(registry.active_count(), 2);

        registry.complete(&a.id, download_result()).unwrap();
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_delete() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Download);
        let removed = registry.delete(&task.id).unwrap();
        assert_eq!(removed.id, task.id);
        assert!(registry.get(&task.id).is_none());
        assert!(matches!(
            registry.delete(&task.id),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_expired_selection() {
        let registry = TaskRegistry::new();
        let old = registry.create(TaskKind::Download);
        let fresh = registry.create(TaskKind::Download);
        registry.complete(&old.id, download_result()).unwrap();
        registry.complete(&fresh.id, download_result()).unwrap();

        let later = Utc::now() + Duration::seconds(7200);
        let expired = registry.expired(Duration::seconds(3600), later);
        assert_eq!(expired.len(), 2);

        let soon = Utc::now() + Duration::seconds(10);
        let expired = registry.expired(Duration::seconds(3600), soon);
        assert!(expired.is_empty());
    }

    #[test]
    fn test_temp_artifacts_accumulate() {
        let registry = TaskRegistry::new();
        let task = registry.create(TaskKind::Composition);
        registry
            .add_temp_artifact(&task.id, PathBuf::from("/tmp/work/a"))
            .unwrap();
        registry
            .add_temp_artifact(&task.id, PathBuf::from("/tmp/work/b"))
            .unwrap();
        assert_eq!(registry.get(&task.id).unwrap().temp_artifacts.len(), 2);
    }
}
