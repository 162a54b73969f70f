//! Background sweep for expired task records and orphaned temp workspaces.

use chrono::{Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

use super::registry::TaskRegistry;

/// Outcome of one sweep, for logging and the cleanup endpoint.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SweepStats {
    /// Expired task records evicted.
    pub evicted_tasks: usize,
    /// Temp workspaces and result directories removed.
    pub removed_dirs: usize,
}

/// Evicts expired task records and reclaims their directories. The janitor is
/// the only component that deletes from the temp root, always scoped to a
/// task id, never a blind sweep.
pub struct Janitor {
    registry: Arc<TaskRegistry>,
    temp_root: PathBuf,
    results_root: PathBuf,
    retention: ChronoDuration,
    interval: Duration,
}

impl Janitor {
    /// Create a janitor over the engine's roots.
    pub fn new(registry: Arc<TaskRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            temp_root: config.temp_dir.clone(),
            results_root: config.results_dir.clone(),
            retention: ChronoDuration::seconds(config.retention_secs as i64),
            interval: Duration::from_secs(config.janitor_interval_secs.max(1)),
        }
    }

    /// Spawn the periodic sweep loop. `wake` forces an immediate sweep (used
    /// by the memory-pressure cleanup path); `shutdown` stops the loop.
    pub fn start(self: Arc<Self>, wake: Arc<Notify>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {
                        debug!("Janitor woken for immediate sweep");
                    }
                    _ = shutdown.cancelled() => {
                        info!("Janitor stopping");
                        return;
                    }
                }

                let stats = self.sweep().await;
                if stats.evicted_tasks > 0 || stats.removed_dirs > 0 {
                    info!(
                        evicted = stats.evicted_tasks,
                        removed_dirs = stats.removed_dirs,
                        "Janitor sweep reclaimed storage"
                    );
                }
            }
        })
    }

    /// Run one sweep: evict expired terminal tasks with their workspaces and
    /// results, then reclaim orphaned temp directories left by a previous
    /// process (the registry does not survive restarts).
    pub async fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        for task in self.registry.expired(self.retention, Utc::now()) {
            if self.registry.delete(&task.id).is_ok() {
                stats.evicted_tasks += 1;
            }
            stats.removed_dirs += self.remove_task_dirs(&task.id).await;
        }

        stats.removed_dirs += self.sweep_orphans().await;
        stats
    }

    /// Remove one task's temp workspace and results directory.
    pub async fn remove_task_dirs(&self, task_id: &str) -> usize {
        let mut removed = 0;
        for root in [&self.temp_root, &self.results_root] {
            let dir = root.join(task_id);
            if dir.exists() {
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        // Cleanup failures are logged, never escalated.
                        warn!("Failed to remove {}: {}", dir.display(), e);
                    }
                }
            }
        }
        removed
    }

    /// Remove temp directories whose id has no live task. Directory names are
    /// task ids, so a live task's workspace is never touched.
    async fn sweep_orphans(&self) -> usize {
        let known = self.registry.known_ids();
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.temp_root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if known.contains(&name) {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    debug!("Removed orphaned workspace {}", name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphan {}: {}", name, e),
            }
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{TaskKind, TaskResult};
    use tempfile::TempDir;

    fn config_with_roots(temp: &TempDir, results: &TempDir, retention_secs: u64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.temp_dir = temp.path().to_path_buf();
        config.results_dir = results.path().to_path_buf();
        config.retention_secs = retention_secs;
        config
    }

    fn download_result() -> TaskResult {
        TaskResult::Download {
            output_file: PathBuf::from("/results/x/video.mp4"),
            file_size_bytes: 10,
            duration_secs: 1.0,
            title: None,
        }
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_and_removes_dirs() {
        let temp = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        // Zero retention: anything terminal is immediately expired.
        let janitor = Janitor::new(
            Arc::clone(&registry),
            &config_with_roots(&temp, &results, 0),
        );

        let task = registry.create(TaskKind::Download);
        registry.complete(&task.id, download_result()).unwrap();

        let workspace = temp.path().join(&task.id);
        let result_dir = results.path().join(&task.id);
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::create_dir_all(&result_dir).unwrap();
        std::fs::write(workspace.join("scratch.bin"), b"x").unwrap();

        // completed_at + 0s retention is in the past once the clock ticks.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = janitor.sweep().await;

        assert_eq!(stats.evicted_tasks, 1);
        assert!(registry.get(&task.id).is_none());
        assert!(!workspace.exists());
        assert!(!result_dir.exists());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_tasks() {
        let temp = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let janitor = Janitor::new(
            Arc::clone(&registry),
            &config_with_roots(&temp, &results, 3600),
        );

        let task = registry.create(TaskKind::Download);
        registry.complete(&task.id, download_result()).unwrap();
        let workspace = temp.path().join(&task.id);
        std::fs::create_dir_all(&workspace).unwrap();

        let stats = janitor.sweep().await;
        assert_eq!(stats.evicted_tasks, 0);
        assert!(registry.get(&task.id).is_some());
        assert!(workspace.exists());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_orphans_only() {
        let temp = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let janitor = Janitor::new(
            Arc::clone(&registry),
            &config_with_roots(&temp, &results, 3600),
        );

        let live = registry.create(TaskKind::Composition);
        let live_dir = temp.path().join(&live.id);
        let orphan_dir = temp.path().join("11111111-dead-beef-0000-000000000000");
        std::fs::create_dir_all(&live_dir).unwrap();
        std::fs::create_dir_all(&orphan_dir).unwrap();

        let stats = janitor.sweep().await;
        assert_eq!(stats.removed_dirs, 1);
        assert!(live_dir.exists());
        assert!(!orphan_dir.exists());
    }
}
