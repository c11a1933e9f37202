use navsim::config::toml_config::parse_override;
use navsim::core::network::{param_count, CoreType};
use navsim::domain::model::SimType;
use navsim::utils::validation::Validate;
use navsim::{ExperimentConfig, NavError, SweepConfig};
use std::path::Path;

fn configs_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/configs"))
}

#[test]
fn test_shipped_configs_are_valid() {
    let walls = ExperimentConfig::from_file(configs_dir().join("walls.toml")).unwrap();
    walls.validate().unwrap();
    assert_eq!(walls.sim_type(), SimType::Walls);
    assert_eq!(walls.num_percept_classes(), 4);
    assert_eq!(walls.arena.obstacles.len(), 2);

    let nowalls = ExperimentConfig::from_file(configs_dir().join("nowalls.toml")).unwrap();
    nowalls.validate().unwrap();
    assert_eq!(nowalls.num_percept_classes(), 2);
    assert!(nowalls.resource.regenerate);
}

#[test]
fn test_sweep_example_expands_enabled_runs() {
    let (sweep, base_dir) = SweepConfig::from_file(configs_dir().join("sweep-example.toml")).unwrap();
    sweep.validate().unwrap();
    let base = ExperimentConfig::from_file(sweep.base_config_path(&base_dir)).unwrap();

    let configs = sweep.expand(&base).unwrap();
    assert_eq!(configs.len(), 6);
    assert_eq!(configs[0].experiment.name, "fnn_rep0");
    assert_eq!(configs[0].network.core, CoreType::Fnn);
    assert_eq!(configs[5].experiment.name, "gru_rep2");
    assert_eq!(configs[5].network.core, CoreType::Gru);
    assert_ne!(param_count(&configs[0].architecture()), param_count(&configs[5].architecture()));
}

#[test]
fn test_environment_substitution_and_overrides() {
    std::env::set_var("NAVSIM_TEST_OUTPUT", "/tmp/navsim-out");
    let config = ExperimentConfig::from_toml_str(
        r#"
[experiment]
name = "env"
sim_type = "walls"

[output]
directory = "${NAVSIM_TEST_OUTPUT}"
"#,
    )
    .unwrap();
    assert_eq!(config.experiment_dir(), Path::new("/tmp/navsim-out/env"));

    let mut overrides = toml::Table::new();
    for assignment in ["agent.resolution=16", "perception.dist_transform=minmax"] {
        let (key, value) = parse_override(assignment).unwrap();
        overrides.insert(key, value);
    }
    let changed = config.with_overrides(&overrides).unwrap();
    assert_eq!(changed.agent.resolution, 16);
    assert_eq!(changed.architecture().input_length, 16);
    assert!(changed.agent_params().track_distance);
}

#[test]
fn test_invalid_population_is_rejected() {
    let mut config = ExperimentConfig::from_file(configs_dir().join("walls.toml")).unwrap();
    config.evolution.population_size = 7;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, NavError::InvalidConfigValueError { .. }));
}
