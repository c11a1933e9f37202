pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::experiments::{
    BaselineExperiment, EvolutionExperiment, SingleRunExperiment, SweepRunner, ValidationExperiment,
};
pub use config::sweep_config::SweepConfig;
pub use config::toml_config::ExperimentConfig;
pub use core::engine::ExperimentEngine;
pub use utils::error::{NavError, Result};
