use super::evolution::{center_file, FITNESS_SPREAD};
use super::{neural_controller, read_json, run_batch, write_json};
use crate::config::cli::LocalStorage;
use crate::config::toml_config::{ExperimentConfig, CONFIG_COPY};
use crate::domain::model::mean;
use crate::domain::ports::{Controller, Experiment, ExperimentReport, Storage};
use crate::utils::error::{NavError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const BASE_MATRIX: &str = "val_matrix_cen.json";
pub const BASE_RESULTS: &str = "val_results_cen.txt";

/// Re-runs the saved centers of the best generations over seeds `0..num_seeds`.
pub struct ValidationExperiment {
    name: String,
    storage: LocalStorage,
    num_nns: Option<usize>,
    num_seeds: Option<u64>,
    label: Option<String>,
    overrides: toml::Table,
}

impl ValidationExperiment {
    pub fn new<P: Into<PathBuf>>(experiment_dir: P) -> Self {
        let storage = LocalStorage::new(experiment_dir);
        let name = storage
            .base_path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "validation".to_string());
        Self {
            name,
            storage,
            num_nns: None,
            num_seeds: None,
            label: None,
            overrides: toml::Table::new(),
        }
    }

    pub fn with_counts(mut self, num_nns: Option<usize>, num_seeds: Option<u64>) -> Self {
        self.num_nns = num_nns;
        self.num_seeds = num_seeds;
        self
    }

    /// Labelled runs apply `overrides` and are compared against the base matrix.
    pub fn with_label(mut self, label: Option<String>, overrides: toml::Table) -> Self {
        self.label = label;
        self.overrides = overrides;
        self
    }

    fn matrix_file(&self) -> String {
        match &self.label {
            Some(label) => format!("val_matrix_cen_{}.json", label),
            None => BASE_MATRIX.to_string(),
        }
    }

    fn results_file(&self) -> String {
        match &self.label {
            Some(label) => format!("val_results_cen_{}.txt", label),
            None => BASE_RESULTS.to_string(),
        }
    }

    async fn load_config(&self) -> Result<ExperimentConfig> {
        if !self.storage.exists(CONFIG_COPY) {
            return Err(NavError::MissingDataError {
                path: self.storage.full_path(CONFIG_COPY).display().to_string(),
            });
        }
        let raw = self.storage.read_file(CONFIG_COPY).await?;
        let content = String::from_utf8(raw).map_err(|e| NavError::config(CONFIG_COPY, e.to_string()))?;
        let config = ExperimentConfig::from_toml_str(&content)?.with_overrides(&self.overrides)?;
        config.validate()?;
        Ok(config)
    }
}

/// Generations ordered best first by their population-average fitness.
pub fn top_generations(spread: &[Vec<Vec<f64>>], count: usize, minimize: bool) -> Vec<(usize, f64)> {
    let mut averages: Vec<(usize, f64)> = spread
        .iter()
        .enumerate()
        .map(|(g, population)| {
            let per_candidate: Vec<f64> = population.iter().map(|episodes| mean(episodes)).collect();
            (g, mean(&per_candidate))
        })
        .collect();
    if minimize {
        averages.sort_by(|a, b| a.1.total_cmp(&b.1));
    } else {
        averages.sort_by(|a, b| b.1.total_cmp(&a.1));
    }
    averages.truncate(count);
    averages
}

fn row_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    matrix.iter().map(|row| (mean(row) * 10.0).round() / 10.0).collect()
}

#[async_trait]
impl Experiment for ValidationExperiment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<ExperimentReport> {
        let mut report = ExperimentReport {
            name: self.name.clone(),
            output_path: self.storage.full_path(&self.results_file()).display().to_string(),
            ..Default::default()
        };

        match &self.label {
            None => tracing::info!("Validating {}", self.name),
            Some(label) => tracing::info!("Validating {} + {}", self.name, label),
        }

        if self.label.is_none() && self.storage.exists(BASE_RESULTS) {
            tracing::info!("{} already exists, skipping", BASE_RESULTS);
            report.summary.insert("skipped".to_string(), json!(true));
            return Ok(report);
        }

        let config = self.load_config().await?;
        let sim_type = config.sim_type();
        let num_nns = self.num_nns.unwrap_or(config.validation.num_nns);
        let num_seeds = self.num_seeds.unwrap_or(config.validation.num_seeds);

        let spread: Vec<Vec<Vec<f64>>> = read_json(&self.storage, FITNESS_SPREAD).await?;
        let top = top_generations(&spread, num_nns, sim_type.minimizes());
        tracing::info!("Validation matrix shape (num_NNs, num_seeds): ({}, {})", top.len(), num_seeds);

        let arch = config.architecture();
        let mut controllers: Vec<Box<dyn Controller>> = Vec::with_capacity(top.len());
        for (generation, _) in &top {
            let center: Vec<f64> = read_json(&self.storage, &center_file(*generation)).await?;
            controllers.push(neural_controller(&arch, &center)?);
        }

        let mut params = config.sim_params();
        params.record_trajectory = false;
        let seeds: Vec<u64> = (0..num_seeds).collect();
        let semaphore = Arc::new(Semaphore::new(config.workers()));
        let outcomes = run_batch(&params, &controllers, &seeds, semaphore).await?;

        let matrix: Vec<Vec<f64>> = outcomes
            .iter()
            .map(|row| row.iter().map(|o| o.validation_score(sim_type)).collect())
            .collect();
        write_json(&self.storage, &self.matrix_file(), &matrix).await?;
        let averages = row_means(&matrix);

        let mut lines = vec![format!(
            "Validation matrix shape (num_NNs, num_seeds): ({}, {})",
            matrix.len(),
            num_seeds
        )];
        match &self.label {
            None => {
                for ((generation, ea_fit), val_fit) in top.iter().zip(&averages) {
                    lines.push(format!(
                        "gen: {} | EA_fit: {} | val_fit: {}",
                        generation, *ea_fit as i64, *val_fit as i64
                    ));
                }
            }
            Some(label) => {
                let base: Vec<Vec<f64>> = read_json(&self.storage, BASE_MATRIX).await?;
                let previous = row_means(&base);
                for (((generation, ea_fit), val_fit), prev_fit) in top.iter().zip(&averages).zip(&previous) {
                    lines.push(format!(
                        "gen: {} | EA_fit: {} | val_fit: {} | val_fit + {}: {}",
                        generation, *ea_fit as i64, *prev_fit as i64, label, *val_fit as i64
                    ));
                }
            }
        }

        for line in lines.iter().skip(1) {
            tracing::info!("{}", line);
        }
        let text = lines.join("\n") + "\n";
        self.storage.write_file(&self.results_file(), text.as_bytes()).await?;

        let generations: Vec<usize> = top.iter().map(|(g, _)| *g).collect();
        report.summary.insert("generations".to_string(), json!(generations));
        report.summary.insert("val_fit".to_string(), json!(averages));
        Ok(report)
    }
}
