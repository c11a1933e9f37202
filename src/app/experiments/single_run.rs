use super::neural_controller;
use crate::config::cli::LocalStorage;
use crate::config::toml_config::ExperimentConfig;
use crate::core::controller::RandomWalk;
use crate::core::simulation::{write_patches_csv, write_trajectory_csv, Simulation};
use crate::domain::ports::{Controller, Experiment, ExperimentReport, Storage};
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;

pub const AGENTS_CSV: &str = "agents.csv";
pub const PATCHES_CSV: &str = "patches.csv";

/// One episode with a saved parameter vector, or a random walk without one.
pub struct SingleRunExperiment {
    config: ExperimentConfig,
    params_path: Option<PathBuf>,
    seed: u64,
    trajectory_out: Option<LocalStorage>,
}

impl SingleRunExperiment {
    pub fn new(config: ExperimentConfig, seed: u64) -> Self {
        Self {
            config,
            params_path: None,
            seed,
            trajectory_out: None,
        }
    }

    /// JSON file holding a flat parameter vector, e.g. `gen12_NNcen.json`.
    pub fn with_params<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.params_path = Some(path.into());
        self
    }

    pub fn with_trajectory_out<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.trajectory_out = Some(LocalStorage::new(dir));
        self
    }

    async fn controller(&self) -> Result<Box<dyn Controller>> {
        match &self.params_path {
            Some(path) => {
                if !path.exists() {
                    return Err(NavError::MissingDataError {
                        path: path.display().to_string(),
                    });
                }
                let data = tokio::fs::read(path).await?;
                let params: Vec<f64> = serde_json::from_slice(&data)?;
                tracing::info!("Loaded {} parameters from {}", params.len(), path.display());
                neural_controller(&self.config.architecture(), &params)
            }
            None => {
                tracing::info!("No parameters given, using a random walk");
                Ok(Box::new(RandomWalk::new(self.config.validation.random_walk_max_turn)))
            }
        }
    }
}

#[async_trait]
impl Experiment for SingleRunExperiment {
    fn name(&self) -> &str {
        &self.config.experiment.name
    }

    async fn run(&self) -> Result<ExperimentReport> {
        let controller = self.controller().await?;
        let mut params = self.config.sim_params();
        params.record_trajectory = self.trajectory_out.is_some() || self.config.output.save_trajectory;

        let sim = Simulation::new(params, controller);
        let seed = self.seed;
        let (outcome, trajectory) = tokio::task::spawn_blocking(move || sim.run(seed)).await??;

        let fitness = outcome.fitness(self.config.sim_type());
        tracing::info!(
            "Seed {} | steps: {} | distance: {:.1} | collected: {} | fitness: {}",
            outcome.seed,
            outcome.steps,
            outcome.distance_to_patch,
            outcome.resources_collected,
            fitness as i64
        );

        let mut report = ExperimentReport {
            name: self.config.experiment.name.clone(),
            ..Default::default()
        };

        if let Some(storage) = &self.trajectory_out {
            let mut agents = Vec::new();
            write_trajectory_csv(&trajectory, &mut agents)?;
            storage.write_file(AGENTS_CSV, &agents).await?;

            let mut patches = Vec::new();
            write_patches_csv(&trajectory, &mut patches)?;
            storage.write_file(PATCHES_CSV, &patches).await?;

            report.output_path = storage.base_path().display().to_string();
            tracing::info!("Trajectory written to {}", report.output_path);
        }

        report.summary.insert("fitness".to_string(), json!(fitness));
        report.summary.insert("outcome".to_string(), serde_json::to_value(&outcome)?);
        report
            .summary
            .insert("frames".to_string(), json!(trajectory.frames.len()));
        Ok(report)
    }
}
