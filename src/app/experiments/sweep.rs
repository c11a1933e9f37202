use super::evolution::EvolutionExperiment;
use crate::config::sweep_config::SweepConfig;
use crate::config::toml_config::ExperimentConfig;
use crate::core::engine::ExperimentEngine;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SweepRunResult {
    pub name: String,
    pub output_path: String,
    pub duration: Duration,
    /// Error message when the run failed and the sweep continued.
    pub error: Option<String>,
}

impl SweepRunResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the expanded evolution experiments of a sweep one after another.
pub struct SweepRunner {
    name: String,
    configs: Vec<ExperimentConfig>,
    continue_on_error: bool,
    monitor_enabled: bool,
}

impl SweepRunner {
    pub fn new(sweep: &SweepConfig, base: &ExperimentConfig) -> Result<Self> {
        Ok(Self {
            name: sweep.sweep.name.clone(),
            configs: sweep.expand(base)?,
            continue_on_error: sweep.sweep.continue_on_error,
            monitor_enabled: false,
        })
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_enabled = enabled;
        self
    }

    pub fn configs(&self) -> &[ExperimentConfig] {
        &self.configs
    }

    pub async fn run_all(&self) -> Result<Vec<SweepRunResult>> {
        let monitor = SystemMonitor::new(self.monitor_enabled);
        tracing::info!("🚀 Sweep '{}' with {} runs", self.name, self.configs.len());
        if monitor.is_enabled() {
            monitor.log_stats("sweep started");
        }

        let mut results = Vec::with_capacity(self.configs.len());
        for (i, config) in self.configs.iter().enumerate() {
            let started = Instant::now();
            tracing::info!("📦 Run {}/{}: {}", i + 1, self.configs.len(), config.experiment.name);

            let engine = ExperimentEngine::new_with_monitoring(EvolutionExperiment::new(config.clone()), self.monitor_enabled);
            match engine.run().await {
                Ok(report) => {
                    tracing::info!("✅ {} done in {:?}", report.name, started.elapsed());
                    results.push(SweepRunResult {
                        name: report.name,
                        output_path: report.output_path,
                        duration: started.elapsed(),
                        error: None,
                    });
                }
                Err(e) if self.continue_on_error => {
                    tracing::warn!("⚠️ {} failed, continuing: {}", config.experiment.name, e);
                    results.push(SweepRunResult {
                        name: config.experiment.name.clone(),
                        output_path: config.experiment_dir().display().to_string(),
                        duration: started.elapsed(),
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => {
                    tracing::error!("❌ {} failed: {}", config.experiment.name, e);
                    return Err(e);
                }
            }
        }

        if monitor.is_enabled() {
            monitor.log_final_stats();
        }
        let failed = results.iter().filter(|r| !r.succeeded()).count();
        tracing::info!(
            "Sweep '{}' finished: {} succeeded, {} failed",
            self.name,
            results.len() - failed,
            failed
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::experiments::test_support::tiny_walls_config;
    use tempfile::TempDir;

    fn sweep(continue_on_error: bool, second_override: &str) -> SweepConfig {
        SweepConfig::from_toml_str(&format!(
            r#"
[sweep]
name = "tiny"
base_config = "base.toml"
continue_on_error = {}

[[runs]]
name = "fnn"
overrides = {{ "network.core" = "fnn", "evolution.generations" = 1 }}

[[runs]]
name = "second"
repetitions = 2
overrides = {{ {} }}
"#,
            continue_on_error, second_override
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_runs_execute_in_order() {
        let dir = TempDir::new().unwrap();
        let base = tiny_walls_config(dir.path().to_str().unwrap());
        let runner = SweepRunner::new(&sweep(false, r#""evolution.generations" = 1"#), &base).unwrap();

        let names: Vec<&str> = runner.configs().iter().map(|c| c.experiment.name.as_str()).collect();
        assert_eq!(names, vec!["fnn_rep0", "second_rep0", "second_rep1"]);

        let results = runner.run_all().await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(SweepRunResult::succeeded));
        assert!(dir.path().join("second_rep1").join("gen0_NNcen.json").exists());
    }

    #[tokio::test]
    async fn test_repetitions_evolve_independently() {
        let dir = TempDir::new().unwrap();
        let base = tiny_walls_config(dir.path().to_str().unwrap());
        let runner = SweepRunner::new(&sweep(false, r#""evolution.generations" = 1"#), &base).unwrap();
        runner.run_all().await.unwrap();

        let rep0 = std::fs::read_to_string(dir.path().join("second_rep0").join("gen0_NNcen.json")).unwrap();
        let rep1 = std::fs::read_to_string(dir.path().join("second_rep1").join("gen0_NNcen.json")).unwrap();
        assert_ne!(rep0, rep1);
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded_when_continuing() {
        let dir = TempDir::new().unwrap();
        let base = tiny_walls_config(dir.path().to_str().unwrap());
        // A patch covering the whole arena leaves no spawn position.
        let overrides = r#""evolution.generations" = 1, "resource.radius" = 300.0, "simulation.max_spawn_attempts" = 5"#;

        let results = SweepRunner::new(&sweep(true, overrides), &base)
            .unwrap()
            .run_all()
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert!(!results[1].succeeded());

        let err = SweepRunner::new(&sweep(false, overrides), &base)
            .unwrap()
            .run_all()
            .await;
        assert!(err.is_err());
    }
}
