use crate::domain::ports::{Experiment, ExperimentReport};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// Drives one experiment and reports resource usage around it.
pub struct ExperimentEngine<E: Experiment> {
    experiment: E,
    monitor: SystemMonitor,
}

impl<E: Experiment> ExperimentEngine<E> {
    pub fn new(experiment: E) -> Self {
        Self::new_with_monitoring(experiment, false)
    }

    pub fn new_with_monitoring(experiment: E, monitor_enabled: bool) -> Self {
        Self {
            experiment,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn experiment(&self) -> &E {
        &self.experiment
    }

    pub async fn run(&self) -> Result<ExperimentReport> {
        let started = Instant::now();
        tracing::info!("Starting experiment '{}'", self.experiment.name());
        if self.monitor.is_enabled() {
            self.monitor.log_stats("start");
        }

        let result = self.experiment.run().await;

        match &result {
            Ok(report) => {
                tracing::info!(
                    "Experiment '{}' finished in {:.2}s, output in {}",
                    report.name,
                    started.elapsed().as_secs_f64(),
                    report.output_path
                );
            }
            Err(e) => {
                tracing::error!(
                    "Experiment '{}' failed after {:.2}s: {}",
                    self.experiment.name(),
                    started.elapsed().as_secs_f64(),
                    e
                );
            }
        }

        if self.monitor.is_enabled() {
            self.monitor.log_final_stats();
        }
        result
    }
}
