use navsim::core::Experiment;
use navsim::app::experiments::evolution::{center_file, FITNESS_SPREAD};
use navsim::app::experiments::validation::{BASE_MATRIX, BASE_RESULTS};
use navsim::config::toml_config::CONFIG_COPY;
use navsim::config::BaselineKind;
use navsim::{
    BaselineExperiment, EvolutionExperiment, ExperimentConfig, ExperimentEngine, ValidationExperiment,
};
use tempfile::TempDir;

fn foraging_config(output: &str) -> ExperimentConfig {
    ExperimentConfig::from_toml_str(&format!(
        r#"
[experiment]
name = "forage_small"
sim_type = "nowalls"

[arena]
width = 200.0
height = 200.0

[simulation]
agents = 2
steps = 60

[agent]
resolution = 6

[resource]
positions = [[100.0, 100.0]]
radius = 40.0
min_units = 2
max_units = 4
regenerate = true

[network]
cnn_depths = [1]
cnn_dims = [2]
hidden_size = 2
core = "rnn"

[evolution]
generations = 3
population_size = 4
episodes = 2
estimator = "median"
workers = 2

[validation]
num_nns = 2
num_seeds = 4
num_runs = 2

[output]
directory = "{}"
"#,
        output
    ))
    .unwrap()
}

#[tokio::test]
async fn test_evolve_then_validate_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = foraging_config(dir.path().to_str().unwrap());
    let experiment_dir = config.experiment_dir();

    let report = ExperimentEngine::new(EvolutionExperiment::new(config.clone()))
        .run()
        .await
        .unwrap();
    assert_eq!(report.summary.get("generations"), Some(&serde_json::json!(3)));
    assert!(experiment_dir.join(CONFIG_COPY).exists());
    assert!(experiment_dir.join(FITNESS_SPREAD).exists());
    for generation in 0..3 {
        assert!(experiment_dir.join(center_file(generation)).exists());
    }

    ExperimentEngine::new(ValidationExperiment::new(&experiment_dir))
        .run()
        .await
        .unwrap();
    let matrix: Vec<Vec<f64>> =
        serde_json::from_slice(&std::fs::read(experiment_dir.join(BASE_MATRIX)).unwrap()).unwrap();
    assert_eq!(matrix.len(), 2);
    assert!(matrix.iter().all(|row| row.len() == 4));

    let text = std::fs::read_to_string(experiment_dir.join(BASE_RESULTS)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Validation matrix shape (num_NNs, num_seeds): (2, 4)");
    assert!(lines[1].starts_with("gen: "));
    assert!(lines[1].contains("| EA_fit: "));
}

#[tokio::test]
async fn test_validation_counts_can_be_overridden() {
    let dir = TempDir::new().unwrap();
    let config = foraging_config(dir.path().to_str().unwrap());
    EvolutionExperiment::new(config.clone()).run().await.unwrap();

    ExperimentEngine::new(ValidationExperiment::new(config.experiment_dir()).with_counts(Some(1), Some(2)))
        .run()
        .await
        .unwrap();
    let text = std::fs::read_to_string(config.experiment_dir().join(BASE_RESULTS)).unwrap();
    assert!(text.starts_with("Validation matrix shape (num_NNs, num_seeds): (1, 2)"));
}

#[tokio::test]
async fn test_baselines_are_written_next_to_experiments() {
    let dir = TempDir::new().unwrap();
    let config = foraging_config(dir.path().to_str().unwrap());

    let random = BaselineExperiment::new(config.clone(), BaselineKind::RandomWalk);
    let report = ExperimentEngine::new(random).run().await.unwrap();
    assert_eq!(report.summary.get("episodes"), Some(&serde_json::json!(8)));
    assert!(dir.path().join("baselines").join("random_walk_forage_small.json").exists());

    let perfect = BaselineExperiment::new(config, BaselineKind::Perfect).with_counts(Some(10), None);
    let report = ExperimentEngine::new(perfect).run().await.unwrap();
    assert_eq!(report.summary.get("episodes"), Some(&serde_json::json!(10)));
}
