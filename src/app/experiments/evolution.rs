use super::{neural_controller, run_batch, write_json};
use crate::config::cli::LocalStorage;
use crate::config::toml_config::{ExperimentConfig, CONFIG_COPY};
use crate::core::network::param_count;
use crate::core::pgpe::Pgpe;
use crate::domain::model::{mean, median};
use crate::domain::ports::{Controller, Experiment, ExperimentReport, Storage};
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

pub const FITNESS_SPREAD: &str = "fitness_spread_per_generation.json";

pub fn center_file(generation: usize) -> String {
    format!("gen{}_NNcen.json", generation)
}

/// Trains controllers with PGPE and saves per-generation results.
pub struct EvolutionExperiment {
    config: ExperimentConfig,
    storage: LocalStorage,
}

impl EvolutionExperiment {
    pub fn new(config: ExperimentConfig) -> Self {
        let storage = LocalStorage::new(config.experiment_dir());
        Self { config, storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    async fn prepare_directory(&self) -> Result<()> {
        let dir = self.storage.base_path();
        if dir.exists() {
            tracing::warn!("Save directory {} exists and will be overwritten", dir.display());
            tokio::fs::remove_dir_all(dir).await?;
        }
        tokio::fs::create_dir_all(dir).await?;
        let copy = self.config.to_toml_string()?;
        self.storage.write_file(CONFIG_COPY, copy.as_bytes()).await
    }
}

#[async_trait]
impl Experiment for EvolutionExperiment {
    fn name(&self) -> &str {
        &self.config.experiment.name
    }

    async fn run(&self) -> Result<ExperimentReport> {
        let overall = Instant::now();
        let cfg = &self.config;
        let evo = &cfg.evolution;
        let sim_type = cfg.sim_type();

        let arch = cfg.architecture();
        arch.check()?;
        let num_params = param_count(&arch);
        let workers = cfg.workers();

        tracing::info!("EA save name: {}", cfg.experiment.name);
        tracing::info!(
            "Model architecture: {:?} {:?} core={}",
            arch.cnn_depths,
            arch.cnn_dims,
            arch.core
        );
        tracing::info!("Total #params: {}", num_params);
        tracing::info!("Workers: {}", workers);

        self.prepare_directory().await?;

        let mut pgpe = Pgpe::new(num_params, cfg.pgpe_settings())?;
        let mut rng = StdRng::seed_from_u64(evo.optimizer_seed);
        let semaphore = Arc::new(Semaphore::new(workers));

        let mut sim_params = cfg.sim_params();
        sim_params.record_trajectory = false;

        let mut start_seed = evo.start_seed;
        let mut fitness_spread: Vec<Vec<Vec<f64>>> = Vec::with_capacity(evo.generations);
        let mut last_top = 0.0;

        for generation in 0..evo.generations {
            let gen_started = Instant::now();

            let population = pgpe.ask(&mut rng);
            let seeds: Vec<u64> = (start_seed..start_seed + evo.episodes as u64).collect();
            start_seed += evo.episodes as u64;

            let controllers = population
                .iter()
                .map(|params| neural_controller(&arch, params))
                .collect::<Result<Vec<Box<dyn Controller>>>>()?;

            let outcomes = run_batch(&sim_params, &controllers, &seeds, semaphore.clone())
                .await
                .map_err(|e| NavError::EvolutionError {
                    generation,
                    message: e.to_string(),
                })?;

            let fitness: Vec<Vec<f64>> = outcomes
                .iter()
                .map(|row| row.iter().map(|o| o.fitness(sim_type)).collect())
                .collect();
            let estimates: Vec<f64> = fitness.iter().map(|row| evo.estimator.estimate(row)).collect();

            let signed: Vec<f64> = if sim_type.minimizes() {
                estimates.iter().map(|f| -f).collect()
            } else {
                estimates.clone()
            };
            pgpe.tell(&signed)?;

            fitness_spread.push(fitness);
            write_json(&self.storage, FITNESS_SPREAD, &fitness_spread).await?;
            write_json(&self.storage, &center_file(generation), pgpe.center()).await?;

            // Reported on the optimizer's scale: costs appear negated.
            let top = signed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            last_top = top;
            tracing::info!(
                "--- gen {} | t: {:.2}s | top: {} | avg: {} | med: {} ---",
                generation,
                gen_started.elapsed().as_secs_f64(),
                top as i64,
                mean(&signed) as i64,
                median(&signed) as i64
            );
        }

        let overall_secs = overall.elapsed().as_secs_f64();
        tracing::info!("Overall time: {:.2}s", overall_secs);

        let mut report = ExperimentReport {
            name: cfg.experiment.name.clone(),
            output_path: self.storage.base_path().display().to_string(),
            ..Default::default()
        };
        report.summary.insert("generations".to_string(), json!(evo.generations));
        report.summary.insert("num_params".to_string(), json!(num_params));
        report.summary.insert("last_top".to_string(), json!(last_top));
        report.summary.insert("overall_secs".to_string(), json!(overall_secs));
        report
            .summary
            .insert("finished_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        Ok(report)
    }
}
