use anyhow::Context;
use clap::Parser;
use navsim::app::experiments::sweep::SweepRunResult;
use navsim::utils::{logger, validation::Validate};
use navsim::{ExperimentConfig, SweepConfig, SweepRunner};

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Run a batch of evolution experiments from one base config")]
struct Args {
    /// Path to sweep configuration file
    #[arg(short, long, default_value = "configs/sweep-example.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log CPU and memory usage around every run
    #[arg(long)]
    monitor: bool,

    /// Show the expanded runs without executing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    tracing::info!("📁 Loading sweep configuration from: {}", args.config);
    let (sweep, base_dir) = match SweepConfig::from_file(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ Failed to load sweep config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = sweep.validate() {
        tracing::error!("❌ Sweep configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let base_path = sweep.base_config_path(&base_dir);
    let base = ExperimentConfig::from_file(&base_path)
        .with_context(|| format!("failed to load base config {}", base_path.display()))?;
    let monitor = args.monitor || base.monitoring.enabled;
    let runner = SweepRunner::new(&sweep, &base)
        .context("failed to expand sweep runs")?
        .with_monitoring(monitor);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be executed");
        for config in runner.configs() {
            println!("{} -> {}", config.experiment.name, config.experiment_dir().display());
        }
        return Ok(());
    }

    match runner.run_all().await {
        Ok(results) => {
            display_results(&results);
            if results.iter().any(|r| !r.succeeded()) {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("❌ Sweep '{}' failed: {}", sweep.sweep.name, e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn display_results(results: &[SweepRunResult]) {
    println!("📊 Sweep results:");
    for result in results {
        match &result.error {
            None => println!("  ✅ {} ({:.1}s) -> {}", result.name, result.duration.as_secs_f64(), result.output_path),
            Some(error) => println!("  ❌ {} ({:.1}s): {}", result.name, result.duration.as_secs_f64(), error),
        }
    }
}
