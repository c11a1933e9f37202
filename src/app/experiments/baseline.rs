use super::{run_batch, write_json};
use crate::config::cli::LocalStorage;
use crate::config::toml_config::ExperimentConfig;
use crate::config::BaselineKind;
use crate::core::arena::Arena;
use crate::core::controller::RandomWalk;
use crate::core::geometry::Vec2;
use crate::domain::model::mean;
use crate::domain::ports::{Controller, Experiment, ExperimentReport};
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const BASELINE_DIR: &str = "baselines";

/// Reference scores for an untrained agent and for an agent that heads
/// straight to the patch.
pub struct BaselineExperiment {
    config: ExperimentConfig,
    kind: BaselineKind,
    num_seeds: u64,
    num_runs: usize,
    storage: LocalStorage,
}

impl BaselineExperiment {
    pub fn new(config: ExperimentConfig, kind: BaselineKind) -> Self {
        let storage = LocalStorage::new(Path::new(&config.output.directory).join(BASELINE_DIR));
        Self {
            num_seeds: config.validation.num_seeds,
            num_runs: config.validation.num_runs,
            config,
            kind,
            storage,
        }
    }

    pub fn with_counts(mut self, num_seeds: Option<u64>, num_runs: Option<usize>) -> Self {
        if let Some(n) = num_seeds {
            self.num_seeds = n;
        }
        if let Some(n) = num_runs {
            self.num_runs = n;
        }
        self
    }

    pub fn output_file(&self) -> String {
        let kind = match self.kind {
            BaselineKind::RandomWalk => "random_walk",
            BaselineKind::Perfect => "perfect",
        };
        format!("{}_{}.json", kind, self.config.experiment.name)
    }

    /// `num_runs x num_seeds` validation scores with a random-walk controller.
    async fn random_walk(&self) -> Result<Vec<Vec<f64>>> {
        let sim_type = self.config.sim_type();
        let mut params = self.config.sim_params();
        params.record_trajectory = false;

        let max_turn = self.config.validation.random_walk_max_turn;
        let controllers: Vec<Box<dyn Controller>> = (0..self.num_runs)
            .map(|_| Box::new(RandomWalk::new(max_turn)) as Box<dyn Controller>)
            .collect();
        let seeds: Vec<u64> = (0..self.num_seeds).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.workers()));

        let outcomes = run_batch(&params, &controllers, &seeds, semaphore).await?;
        Ok(outcomes
            .iter()
            .map(|row| row.iter().map(|o| o.validation_score(sim_type)).collect())
            .collect())
    }

    /// Steps needed to reach the patch edge at full speed from random starts.
    fn perfect(&self) -> Result<Vec<Vec<f64>>> {
        let target = self
            .config
            .resource
            .positions
            .first()
            .map(|p| Vec2::new(p[0], p[1]))
            .ok_or_else(|| NavError::MissingConfigError {
                field: "resource.positions".to_string(),
            })?;
        let arena = Arena::new(
            self.config.arena.width,
            self.config.arena.height,
            self.config.arena.boundary_scale,
            self.config.agent.radius,
            true,
            Vec::new(),
        );
        Ok(vec![perfect_times(
            &arena,
            self.config.agent.radius,
            target,
            self.config.resource.radius,
            self.config.agent.max_velocity,
            self.num_seeds,
        )])
    }
}

pub fn perfect_times(
    arena: &Arena,
    agent_radius: f64,
    target: Vec2,
    patch_radius: f64,
    max_velocity: f64,
    num_seeds: u64,
) -> Vec<f64> {
    let (lo, hi) = arena.spawn_bounds(agent_radius);
    (0..num_seeds)
        .map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let start = Vec2::new(rng.gen_range(lo.x..hi.x).floor(), rng.gen_range(lo.y..hi.y).floor());
            ((start.distance(target) - patch_radius) / max_velocity).max(0.0)
        })
        .collect()
}

#[async_trait]
impl Experiment for BaselineExperiment {
    fn name(&self) -> &str {
        &self.config.experiment.name
    }

    async fn run(&self) -> Result<ExperimentReport> {
        tracing::info!("Running {:?} baseline for {}", self.kind, self.config.experiment.name);

        let scores = match self.kind {
            BaselineKind::RandomWalk => self.random_walk().await?,
            BaselineKind::Perfect => self.perfect()?,
        };
        let file = self.output_file();
        write_json(&self.storage, &file, &scores).await?;

        let flat: Vec<f64> = scores.iter().flatten().copied().collect();
        let val_fit = mean(&flat);
        tracing::info!("val_fit: {}", val_fit as i64);

        let mut report = ExperimentReport {
            name: self.config.experiment.name.clone(),
            output_path: self.storage.full_path(&file).display().to_string(),
            ..Default::default()
        };
        report.summary.insert("val_fit".to_string(), json!(val_fit));
        report.summary.insert("episodes".to_string(), json!(flat.len()));
        Ok(report)
    }
}
