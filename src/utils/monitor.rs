#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// Process resource usage at one point of an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub phase: String,
    /// Summed over cores, so it exceeds 100% while workers are busy.
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub rss_percent: f32,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    peak_rss_mb: u64,
    samples: Vec<ResourceSample>,
}

/// Samples CPU and memory of this process between experiment phases.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    state: Option<Mutex<MonitorState>>,
    pid: Option<Pid>,
    started: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid()
                .map_err(|e| tracing::warn!("System monitoring unavailable: {}", e))
                .ok()
        } else {
            None
        };

        let state = pid.map(|_| {
            let mut system = System::new_with_specifics(RefreshKind::everything());
            system.refresh_all();
            Mutex::new(MonitorState {
                system,
                peak_rss_mb: 0,
                samples: Vec::new(),
            })
        });

        Self {
            state,
            pid,
            started: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Takes a sample and keeps it for the final summary.
    pub fn sample(&self, phase: &str) -> Option<ResourceSample> {
        let mut state = self.state.as_ref()?.lock().ok()?;
        state.system.refresh_all();

        let (cpu_percent, rss_mb) = {
            let process = state.system.process(self.pid?)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        let total_mb = state.system.total_memory() / 1024 / 1024;
        let rss_percent = if total_mb > 0 {
            rss_mb as f32 / total_mb as f32 * 100.0
        } else {
            0.0
        };
        state.peak_rss_mb = state.peak_rss_mb.max(rss_mb);

        let sample = ResourceSample {
            phase: phase.to_string(),
            cpu_percent,
            rss_mb,
            rss_percent,
            elapsed: self.started.elapsed(),
        };
        state.samples.push(sample.clone());
        Some(sample)
    }

    pub fn peak_rss_mb(&self) -> Option<u64> {
        let state = self.state.as_ref()?.lock().ok()?;
        Some(state.peak_rss_mb)
    }

    pub fn samples(&self) -> Vec<ResourceSample> {
        self.state
            .as_ref()
            .and_then(|s| s.lock().ok().map(|state| state.samples.clone()))
            .unwrap_or_default()
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(s) = self.sample(phase) {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, RSS: {}MB ({:.1}%), Time: {:?}",
                s.phase,
                s.cpu_percent,
                s.rss_mb,
                s.rss_percent,
                s.elapsed
            );
        }
    }

    pub fn log_final_stats(&self) {
        if self.sample("final").is_none() {
            return;
        }
        let samples = self.samples();
        let mean_cpu = samples.iter().map(|s| s.cpu_percent).sum::<f32>() / samples.len() as f32;
        tracing::info!(
            "📊 Final - Time: {:?}, Peak RSS: {}MB, Mean CPU: {:.1}% over {} samples",
            self.started.elapsed(),
            self.peak_rss_mb().unwrap_or(0),
            mean_cpu,
            samples.len()
        );
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Without the `cli` feature there is no sysinfo backend and nothing is sampled.
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn sample(&self, _phase: &str) -> Option<ResourceSample> {
        None
    }

    pub fn peak_rss_mb(&self) -> Option<u64> {
        None
    }

    pub fn samples(&self) -> Vec<ResourceSample> {
        Vec::new()
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_takes_no_samples() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample("start").is_none());
        assert!(monitor.samples().is_empty());
    }

    #[test]
    fn test_enabled_monitor_tracks_peak() {
        let monitor = SystemMonitor::new(true);
        if !monitor.is_enabled() {
            return;
        }
        let first = monitor.sample("a").unwrap();
        monitor.sample("b").unwrap();
        assert_eq!(monitor.samples().len(), 2);
        assert!(monitor.peak_rss_mb().unwrap() >= first.rss_mb);
        assert_eq!(monitor.samples()[0].phase, "a");
    }
}
