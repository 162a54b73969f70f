//! Sampled system resources and the admission gate.
//!
//! A background loop refreshes CPU, memory and disk readings on a fixed
//! interval; `can_admit` reads the latest sample without blocking so
//! admission decisions stay O(1). Crossing the memory threshold wakes the
//! janitor for a best-effort cleanup pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use sysinfo::{Disks, System};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ResourceConfig;

/// One reading of system resources.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub disk_free_bytes: u64,
    pub sampled_at: DateTime<Utc>,
}

impl Default for ResourceSample {
    fn default() -> Self {
        // Before the first refresh completes, report a healthy system so
        // startup submissions are not spuriously rejected.
        Self {
            cpu_percent: 0.0,
            mem_percent: 0.0,
            disk_free_bytes: u64::MAX,
            sampled_at: Utc::now(),
        }
    }
}

/// Admission decision derived from the latest sample.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionVerdict {
    pub admit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdmissionVerdict {
    fn admit() -> Self {
        Self {
            admit: true,
            reason: None,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            admit: false,
            reason: Some(reason),
        }
    }
}

/// Samples CPU/memory/disk and answers admission queries from the latest
/// reading.
pub struct ResourceMonitor {
    config: ResourceConfig,
    watch_path: PathBuf,
    latest: RwLock<ResourceSample>,
    system: Mutex<System>,
    disks: Mutex<Disks>,
}

impl ResourceMonitor {
    /// Create a monitor watching free space on the filesystem holding
    /// `watch_path` (the engine's temp root).
    pub fn new(config: ResourceConfig, watch_path: PathBuf) -> Self {
        Self {
            config,
            watch_path,
            latest: RwLock::new(ResourceSample::default()),
            system: Mutex::new(System::new()),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    /// Latest sample (never blocks on a fresh reading).
    pub fn latest(&self) -> ResourceSample {
        *self.latest.read().expect("sample lock poisoned")
    }

    /// Admission verdict from the latest sample. Concurrency ceilings are
    /// enforced by the engine's worker permits, not here.
    pub fn can_admit(&self) -> AdmissionVerdict {
        verdict_for(&self.latest(), &self.config)
    }

    /// Take a fresh reading. Blocking; called from the sampling loop.
    pub fn sample_now(&self) -> ResourceSample {
        let (cpu_percent, mem_percent) = {
            let mut system = self.system.lock().expect("system lock poisoned");
            system.refresh_cpu_usage();
            system.refresh_memory();

            let total = system.total_memory();
            let mem_percent = if total > 0 {
                (system.used_memory() as f64 / total as f64 * 100.0) as f32
            } else {
                0.0
            };
            (system.global_cpu_usage(), mem_percent)
        };

        let disk_free_bytes = {
            let mut disks = self.disks.lock().expect("disks lock poisoned");
            disks.refresh(true);
            free_space_for(&disks, &self.watch_path)
        };

        let sample = ResourceSample {
            cpu_percent,
            mem_percent,
            disk_free_bytes,
            sampled_at: Utc::now(),
        };
        *self.latest.write().expect("sample lock poisoned") = sample;
        sample
    }

    /// Spawn the sampling loop. Crossing the memory threshold notifies
    /// `cleanup` (the janitor's wake handle) once per crossing.
    pub fn start(
        self: std::sync::Arc<Self>,
        cleanup: std::sync::Arc<Notify>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.sample_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut was_over = false;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.cancelled() => {
                        debug!("Resource monitor stopping");
                        return;
                    }
                }

                let monitor = std::sync::Arc::clone(&self);
                let sample = match tokio::task::spawn_blocking(move || monitor.sample_now()).await {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!("Resource sampling task failed: {}", e);
                        continue;
                    }
                };

                let over = sample.mem_percent >= self.config.max_memory_percent;
                if over && !was_over {
                    warn!(
                        mem_percent = sample.mem_percent,
                        "Memory threshold crossed, requesting cleanup"
                    );
                    cleanup.notify_one();
                }
                was_over = over;
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn inject_sample(&self, sample: ResourceSample) {
        *self.latest.write().expect("sample lock poisoned") = sample;
    }
}

/// Pure admission policy over a sample.
fn verdict_for(sample: &ResourceSample, config: &ResourceConfig) -> AdmissionVerdict {
    if sample.mem_percent >= config.max_memory_percent {
        return AdmissionVerdict::deny(format!(
            "memory usage {:.1}% at or above threshold {:.1}%",
            sample.mem_percent, config.max_memory_percent
        ));
    }
    if sample.disk_free_bytes < config.min_disk_free_bytes {
        return AdmissionVerdict::deny(format!(
            "free disk {} bytes below minimum {} bytes",
            sample.disk_free_bytes, config.min_disk_free_bytes
        ));
    }
    AdmissionVerdict::admit()
}

/// Free space on the disk whose mount point is the longest prefix of `path`.
fn free_space_for(disks: &Disks, path: &std::path::Path) -> u64 {
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        // No matching mount (e.g. path not created yet): don't block admission.
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mem: f32, disk_free: u64) -> ResourceSample {
        ResourceSample {
            cpu_percent: 10.0,
            mem_percent: mem,
            disk_free_bytes: disk_free,
            sampled_at: Utc::now(),
        }
    }

    #[test]
    fn test_admit_when_healthy() {
        let verdict = verdict_for(&sample(40.0, 10 << 30), &ResourceConfig::default());
        assert!(verdict.admit);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_deny_at_memory_threshold() {
        let verdict = verdict_for(&sample(80.0, 10 << 30), &ResourceConfig::default());
        assert!(!verdict.admit);
        assert!(verdict.reason.unwrap().contains("memory"));
    }

    #[test]
    fn test_deny_on_low_disk() {
        let verdict = verdict_for(&sample(40.0, 1024), &ResourceConfig::default());
        assert!(!verdict.admit);
        assert!(verdict.reason.unwrap().contains("disk"));
    }

    #[test]
    fn test_can_admit_reads_latest_sample() {
        let monitor = ResourceMonitor::new(
            ResourceConfig::default(),
            std::env::temp_dir(),
        );
        monitor.inject_sample(sample(95.0, 10 << 30));
        assert!(!monitor.can_admit().admit);

        monitor.inject_sample(sample(30.0, 10 << 30));
        assert!(monitor.can_admit().admit);
    }

    #[test]
    fn test_sample_now_populates_reading() {
        let monitor = ResourceMonitor::new(ResourceConfig::default(), std::env::temp_dir());
        let sample = monitor.sample_now();
        assert!(sample.mem_percent >= 0.0);
        assert!(sample.mem_percent <= 100.0);
        assert_eq!(monitor.latest().sampled_at, sample.sampled_at);
    }
}
