pub mod cli;
pub mod sweep_config;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::{NavError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_path, validate_positive_number, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "navsim")]
#[command(about = "Evolve and evaluate visually navigating agents")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Run a single episode and optionally export its trajectory
    Simulate {
        #[arg(long)]
        config: String,
        /// JSON parameter vector; a random walk is used when omitted
        #[arg(long)]
        params: Option<String>,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Directory for trajectory CSV files
        #[arg(long)]
        trajectory_out: Option<String>,
    },
    /// Train controllers with PGPE
    Evolve {
        #[arg(long)]
        config: String,
        /// Overrides `output.directory`
        #[arg(long)]
        output: Option<String>,
    },
    /// Re-run the best saved generations over fresh seeds
    Validate {
        /// Directory written by `evolve`
        #[arg(long)]
        experiment_dir: String,
        #[arg(long)]
        num_nns: Option<usize>,
        #[arg(long)]
        num_seeds: Option<u64>,
        /// Suffix for result files of perturbed re-runs
        #[arg(long)]
        label: Option<String>,
        /// Dotted-key override, e.g. perception.dist_noise_std=0.1
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Random-walk or analytic optimum reference scores
    Baseline {
        #[arg(long)]
        config: String,
        #[arg(long, value_enum, default_value = "random-walk")]
        kind: BaselineKind,
        #[arg(long)]
        num_seeds: Option<u64>,
        #[arg(long)]
        num_runs: Option<usize>,
    },
}

#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineKind {
    RandomWalk,
    Perfect,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Simulate { config, params, trajectory_out, .. } => {
                validate_path("config", config)?;
                if let Some(params) = params {
                    validate_path("params", params)?;
                }
                if let Some(dir) = trajectory_out {
                    validate_path("trajectory_out", dir)?;
                }
            }
            Command::Evolve { config, output } => {
                validate_path("config", config)?;
                if let Some(output) = output {
                    validate_path("output", output)?;
                }
            }
            Command::Validate {
                experiment_dir,
                num_nns,
                num_seeds,
                label,
                overrides,
            } => {
                validate_path("experiment_dir", experiment_dir)?;
                if let Some(n) = num_nns {
                    validate_positive_number("num_nns", *n, 1)?;
                }
                if let Some(n) = num_seeds {
                    validate_positive_number("num_seeds", *n as usize, 1)?;
                }
                if !overrides.is_empty() && label.is_none() {
                    return Err(NavError::MissingConfigError {
                        field: "label (required with --set)".to_string(),
                    });
                }
            }
            Command::Baseline { config, num_seeds, num_runs, .. } => {
                validate_path("config", config)?;
                if let Some(n) = num_seeds {
                    validate_positive_number("num_seeds", *n as usize, 1)?;
                }
                if let Some(n) = num_runs {
                    validate_positive_number("num_runs", *n, 1)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evolve() {
        let cli = CliConfig::parse_from(["navsim", "--verbose", "evolve", "--config", "walls.toml"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Evolve { ref config, .. } if config == "walls.toml"));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_overrides_require_label() {
        let cli = CliConfig::parse_from([
            "navsim",
            "validate",
            "--experiment-dir",
            "data/walls",
            "--set",
            "perception.dist_noise_std=0.1",
        ]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_baseline_kind() {
        let cli = CliConfig::parse_from(["navsim", "baseline", "--config", "c.toml", "--kind", "perfect"]);
        assert!(matches!(cli.command, Command::Baseline { kind: BaselineKind::Perfect, .. }));
    }
}
