use anyhow::Context;
use clap::Parser;
use navsim::config::toml_config::{parse_override, CONFIG_COPY};
use navsim::config::Command;
use navsim::domain::ports::{Experiment, ExperimentReport};
use navsim::utils::error::ErrorSeverity;
use navsim::utils::{logger, validation::Validate};
use navsim::{
    BaselineExperiment, CliConfig, EvolutionExperiment, ExperimentConfig, ExperimentEngine,
    SingleRunExperiment, ValidationExperiment,
};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let monitoring = config_path(&cli.command)
        .and_then(|path| ExperimentConfig::from_file(path).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();
    if cli.json_logs || monitoring.json_logs {
        let level = if cli.verbose { Some("debug") } else { monitoring.log_level.as_deref() };
        logger::init_json_logger(level);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting navsim CLI");
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match dispatch(&cli).await {
        Ok(report) => {
            tracing::info!("✅ {} completed", report.name);
            if !report.output_path.is_empty() {
                println!("📁 Output saved to: {}", report.output_path);
            }
            let summary = serde_json::to_string_pretty(&report.summary).context("failed to render run summary")?;
            println!("{}", summary);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

/// Config whose `[monitoring]` section picks the log format.
fn config_path(command: &Command) -> Option<PathBuf> {
    match command {
        Command::Simulate { config, .. } | Command::Evolve { config, .. } | Command::Baseline { config, .. } => {
            Some(PathBuf::from(config))
        }
        Command::Validate { experiment_dir, .. } => Some(Path::new(experiment_dir).join(CONFIG_COPY)),
    }
}

fn load_config(path: &str) -> navsim::Result<ExperimentConfig> {
    tracing::info!("📁 Loading configuration from: {}", path);
    let config = ExperimentConfig::from_file(path)?;
    config.validate()?;
    Ok(config)
}

async fn run_engine<E: Experiment>(experiment: E, monitor: bool) -> navsim::Result<ExperimentReport> {
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    ExperimentEngine::new_with_monitoring(experiment, monitor).run().await
}

async fn dispatch(cli: &CliConfig) -> navsim::Result<ExperimentReport> {
    match &cli.command {
        Command::Simulate {
            config,
            params,
            seed,
            trajectory_out,
        } => {
            let config = load_config(config)?;
            let monitor = cli.monitor || config.monitoring.enabled;
            let mut experiment = SingleRunExperiment::new(config, *seed);
            if let Some(path) = params {
                experiment = experiment.with_params(path);
            }
            if let Some(dir) = trajectory_out {
                experiment = experiment.with_trajectory_out(dir);
            }
            run_engine(experiment, monitor).await
        }
        Command::Evolve { config, output } => {
            let mut config = load_config(config)?;
            if let Some(output) = output {
                config.output.directory = output.clone();
            }
            let monitor = cli.monitor || config.monitoring.enabled;
            run_engine(EvolutionExperiment::new(config), monitor).await
        }
        Command::Validate {
            experiment_dir,
            num_nns,
            num_seeds,
            label,
            overrides,
        } => {
            let mut table = toml::Table::new();
            for assignment in overrides {
                let (key, value) = parse_override(assignment)?;
                table.insert(key, value);
            }
            let experiment = ValidationExperiment::new(experiment_dir)
                .with_counts(*num_nns, *num_seeds)
                .with_label(label.clone(), table);
            run_engine(experiment, cli.monitor).await
        }
        Command::Baseline {
            config,
            kind,
            num_seeds,
            num_runs,
        } => {
            let config = load_config(config)?;
            let monitor = cli.monitor || config.monitoring.enabled;
            let experiment = BaselineExperiment::new(config, *kind).with_counts(*num_seeds, *num_runs);
            run_engine(experiment, monitor).await
        }
    }
}
