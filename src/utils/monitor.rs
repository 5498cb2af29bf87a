//! Per-stage process statistics for a batch run.

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct StageStats {
    pub stage: String,
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    peak_memory_mb: u64,
    stages: Vec<StageStats>,
}

#[cfg(feature = "cli")]
pub struct SystemMonitor {
    state: Option<Mutex<MonitorState>>,
    pid: Option<Pid>,
    start_time: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(pid),
                Err(e) => {
                    tracing::warn!("Process monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let state = pid.map(|_| {
            Mutex::new(MonitorState {
                system: System::new(),
                peak_memory_mb: 0,
                stages: Vec::new(),
            })
        });

        Self {
            state,
            pid,
            start_time: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Samples the current process and records it under `stage`.
    pub fn sample(&self, stage: &str) -> Option<StageStats> {
        let pid = self.pid?;
        let mut state = self.state.as_ref()?.lock().ok()?;

        state.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = state.system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        let cpu_usage = process.cpu_usage();

        state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);
        let stats = StageStats {
            stage: stage.to_string(),
            cpu_usage,
            memory_usage_mb: memory_mb,
            peak_memory_mb: state.peak_memory_mb,
            elapsed: self.start_time.elapsed(),
        };
        state.stages.push(stats.clone());
        Some(stats)
    }

    pub fn log_stats(&self, stage: &str) {
        if let Some(stats) = self.sample(stage) {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                stats.stage,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed
            );
        }
    }

    pub fn log_final_stats(&self) {
        let Some(state) = self.state.as_ref().and_then(|s| s.lock().ok()) else {
            return;
        };
        tracing::info!(
            "📊 Final Stats - {} stage(s), Total Time: {:?}, Peak Memory: {}MB",
            state.stages.len(),
            self.start_time.elapsed(),
            state.peak_memory_mb
        );
    }

    pub fn stages(&self) -> Vec<StageStats> {
        self.state
            .as_ref()
            .and_then(|s| s.lock().ok())
            .map(|state| state.stages.clone())
            .unwrap_or_default()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// Without the cli feature there is no sysinfo; monitoring is a no-op.
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn log_stats(&self, _stage: &str) {}

    pub fn log_final_stats(&self) {}
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample("extract").is_none());
        assert!(monitor.stages().is_empty());
    }

    #[test]
    fn test_enabled_monitor_tracks_stages() {
        let monitor = SystemMonitor::new(true);
        if !monitor.is_enabled() {
            return;
        }
        monitor.log_stats("extract");
        monitor.log_stats("load");

        let stages = monitor.stages();
        assert!(stages.len() <= 2);
        if let [first, second] = stages.as_slice() {
            assert_eq!(first.stage, "extract");
            assert_eq!(second.stage, "load");
            assert!(second.peak_memory_mb >= first.memory_usage_mb);
        }
    }
}
