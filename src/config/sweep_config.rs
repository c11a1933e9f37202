use crate::config::toml_config::ExperimentConfig;
use crate::utils::error::{NavError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A batch of evolution runs derived from one base experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub sweep: SweepInfo,
    pub runs: Vec<RunDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepInfo {
    pub name: String,
    /// Relative paths resolve against the sweep file's directory.
    pub base_config: String,
    #[serde(default)]
    pub description: String,
    /// Keep going when a run fails.
    #[serde(default)]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefinition {
    pub name: String,
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Dotted keys into the experiment config, e.g. `"network.core" = "gru"`.
    #[serde(default)]
    pub overrides: toml::Table,
}

fn default_repetitions() -> usize {
    1
}

impl RunDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl SweepConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<(Self, PathBuf)> {
        let content = std::fs::read_to_string(&path).map_err(NavError::IoError)?;
        let config = Self::from_toml_str(&content)?;
        let base_dir = path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((config, base_dir))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NavError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn base_config_path(&self, base_dir: &Path) -> PathBuf {
        let path = Path::new(&self.sweep.base_config);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Expands every enabled run into `repetitions` named experiment configs.
    ///
    /// Repetition `k` offsets the optimizer seed by `k` and moves the episode
    /// seeds past every seed an earlier repetition consumes.
    pub fn expand(&self, base: &ExperimentConfig) -> Result<Vec<ExperimentConfig>> {
        let mut configs = Vec::new();
        for run in self.runs.iter().filter(|r| r.is_enabled()) {
            let derived = base.with_overrides(&run.overrides)?;
            let evo = &derived.evolution;
            let seeds_per_rep = (evo.generations as u64).saturating_mul(evo.episodes as u64);
            for rep in 0..run.repetitions {
                let rep = rep as u64;
                let mut config = derived.clone();
                config.experiment.name = format!("{}_rep{}", run.name, rep);
                config.evolution.optimizer_seed = evo.optimizer_seed.wrapping_add(rep);
                config.evolution.start_seed = evo.start_seed.wrapping_add(rep.saturating_mul(seeds_per_rep));
                config.validate()?;
                configs.push(config);
            }
        }
        Ok(configs)
    }
}

impl Validate for SweepConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("sweep.name", &self.sweep.name)?;
        validate_path("sweep.base_config", &self.sweep.base_config)?;
        if self.runs.is_empty() {
            return Err(NavError::MissingConfigError {
                field: "runs".to_string(),
            });
        }

        let mut names = HashSet::new();
        for run in &self.runs {
            validate_non_empty_string("runs.name", &run.name)?;
            validate_positive_number("runs.repetitions", run.repetitions, 1)?;
            if !names.insert(run.name.as_str()) {
                return Err(NavError::InvalidConfigValueError {
                    field: "runs.name".to_string(),
                    value: run.name.clone(),
                    reason: "Run names must be unique".to_string(),
                });
            }
        }
        Ok(())
    }
}
