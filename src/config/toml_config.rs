use crate::core::agent::AgentParams;
use crate::core::arena::Obstacle;
use crate::core::geometry::Vec2;
use crate::core::network::{Activation, Architecture, CoreType};
use crate::core::perception::DistTransform;
use crate::core::pgpe::PgpeSettings;
use crate::core::simulation::SimParams;
use crate::domain::model::{Estimator, SimType};
use crate::utils::error::{NavError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative, validate_path, validate_positive_number,
    validate_one_of, validate_range, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

/// Complete description of one experiment, as stored in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentInfo,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub sim_type: SimType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
    /// How far wall end points sit outside the arena corners.
    pub boundary_scale: f64,
    pub obstacles: Vec<Obstacle>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            boundary_scale: 0.0,
            obstacles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub agents: usize,
    pub steps: usize,
    pub max_spawn_attempts: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: 1,
            steps: 1000,
            max_spawn_attempts: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub radius: f64,
    pub max_velocity: f64,
    /// Half-width of the visual field as a fraction of π.
    pub fov: f64,
    pub vision_range: f64,
    pub resolution: usize,
    pub consumption: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            max_velocity: 1.0,
            fov: 0.4,
            vision_range: 1500.0,
            resolution: 8,
            consumption: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub positions: Vec<[f64; 2]>,
    pub radius: f64,
    pub min_units: u64,
    pub max_units: u64,
    pub min_quality: f64,
    pub max_quality: f64,
    pub regenerate: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            positions: vec![[400.0, 400.0]],
            radius: 50.0,
            min_units: 1,
            max_units: 1,
            min_quality: 1.0,
            max_quality: 1.0,
            regenerate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub dist_transform: DistTransform,
    /// Fractions of the full range; angle noise is scaled by 2π, action noise by 2.
    pub angle_noise_std: f64,
    pub dist_noise_std: f64,
    pub action_noise_std: f64,
    pub other_input_size: usize,
    pub other_input_enabled: bool,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            dist_transform: DistTransform::None,
            angle_noise_std: 0.0,
            dist_noise_std: 0.0,
            action_noise_std: 0.0,
            other_input_size: 1,
            other_input_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cnn_depths: Vec<usize>,
    pub cnn_dims: Vec<usize>,
    pub kernel_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub activation: Activation,
    pub core: CoreType,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cnn_depths: vec![1],
            cnn_dims: vec![4],
            kernel_size: 3,
            hidden_size: 2,
            output_size: 1,
            activation: Activation::Relu,
            core: CoreType::Fnn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub generations: usize,
    pub population_size: usize,
    pub episodes: usize,
    pub init_sigma: f64,
    pub step_sigma: f64,
    pub step_mu: f64,
    pub momentum: f64,
    pub start_seed: u64,
    pub estimator: Estimator,
    /// Seed of the optimizer's sampling noise.
    pub optimizer_seed: u64,
    /// Concurrent simulations; defaults to the number of CPUs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            generations: 100,
            population_size: 50,
            episodes: 5,
            init_sigma: 0.1,
            step_sigma: 0.1,
            step_mu: 0.1,
            momentum: 0.9,
            start_seed: 0,
            estimator: Estimator::Mean,
            optimizer_seed: 0,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Best generations to re-run.
    pub num_nns: usize,
    pub num_seeds: u64,
    /// Random-walk baseline repetitions.
    pub num_runs: usize,
    pub random_walk_max_turn: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            num_nns: 1,
            num_seeds: 100,
            num_runs: 1,
            random_walk_max_turn: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub save_trajectory: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./data/experiments".to_string(),
            save_trajectory: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    pub json_logs: bool,
}

/// Name of the config copy stored next to the results.
pub const CONFIG_COPY: &str = "experiment.toml";

impl ExperimentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(NavError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| NavError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NavError::ConfigValidationError {
            field: "toml_serialization".to_string(),
            message: e.to_string(),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| NavError::config("environment", e.to_string()))?;
        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });
        Ok(result.to_string())
    }

    /// Returns a copy with dotted-key overrides such as `agent.resolution = 16` applied.
    pub fn with_overrides(&self, overrides: &toml::Table) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        let mut root = toml::Value::try_from(self).map_err(|e| NavError::config("overrides", e.to_string()))?;
        for (key, value) in overrides {
            set_dotted(&mut root, key, value.clone())?;
        }
        root.try_into().map_err(|e: toml::de::Error| NavError::ConfigValidationError {
            field: "overrides".to_string(),
            message: e.to_string(),
        })
    }

    pub fn experiment_dir(&self) -> PathBuf {
        Path::new(&self.output.directory).join(&self.experiment.name)
    }

    pub fn sim_type(&self) -> SimType {
        self.experiment.sim_type
    }

    pub fn num_percept_classes(&self) -> usize {
        self.experiment.sim_type.num_percept_classes(self.simulation.agents)
    }

    pub fn agent_params(&self) -> AgentParams {
        AgentParams {
            radius: self.agent.radius,
            max_velocity: self.agent.max_velocity,
            fov: self.agent.fov,
            vision_range: self.agent.vision_range,
            resolution: self.agent.resolution,
            consumption: self.agent.consumption,
            angle_noise_std: self.perception.angle_noise_std * TAU,
            track_distance: self.perception.dist_transform.is_active(),
        }
    }

    pub fn sim_params(&self) -> SimParams {
        SimParams {
            sim_type: self.experiment.sim_type,
            width: self.arena.width,
            height: self.arena.height,
            boundary_scale: self.arena.boundary_scale,
            num_agents: self.simulation.agents,
            horizon: self.simulation.steps,
            agent: self.agent_params(),
            obstacles: self.arena.obstacles.clone(),
            patch_positions: self.resource.positions.iter().map(|p| Vec2::new(p[0], p[1])).collect(),
            patch_radius: self.resource.radius,
            patch_units: (self.resource.min_units, self.resource.max_units),
            patch_quality: (self.resource.min_quality, self.resource.max_quality),
            regenerate_patches: self.resource.regenerate,
            other_input_size: self.perception.other_input_size,
            other_input_enabled: self.perception.other_input_enabled,
            dist_transform: self.perception.dist_transform,
            dist_noise_std: self.perception.dist_noise_std,
            action_noise_std: self.perception.action_noise_std,
            record_trajectory: self.output.save_trajectory,
            max_spawn_attempts: self.simulation.max_spawn_attempts,
        }
    }

    pub fn architecture(&self) -> Architecture {
        Architecture {
            input_channels: self.num_percept_classes(),
            input_length: self.agent.resolution,
            cnn_depths: self.network.cnn_depths.clone(),
            cnn_dims: self.network.cnn_dims.clone(),
            kernel_size: self.network.kernel_size,
            other_input_size: self.perception.other_input_size,
            hidden_size: self.network.hidden_size,
            output_size: self.network.output_size,
            activation: self.network.activation,
            core: self.network.core,
        }
    }

    pub fn pgpe_settings(&self) -> PgpeSettings {
        let e = &self.evolution;
        PgpeSettings::clipup(e.population_size, e.init_sigma, e.step_mu, e.step_sigma, e.momentum)
    }

    pub fn workers(&self) -> usize {
        self.evolution
            .workers
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("experiment.name", &self.experiment.name)?;
        if self.experiment.name.contains(['/', '\\']) {
            return Err(NavError::InvalidConfigValueError {
                field: "experiment.name".to_string(),
                value: self.experiment.name.clone(),
                reason: "Name is used as a directory and cannot contain path separators".to_string(),
            });
        }
        validate_path("output.directory", &self.output.directory)?;

        for (field, value) in [
            ("arena.width", self.arena.width),
            ("arena.height", self.arena.height),
            ("agent.radius", self.agent.radius),
            ("agent.max_velocity", self.agent.max_velocity),
            ("agent.vision_range", self.agent.vision_range),
            ("agent.consumption", self.agent.consumption),
            ("resource.radius", self.resource.radius),
            ("resource.min_quality", self.resource.min_quality),
            ("perception.angle_noise_std", self.perception.angle_noise_std),
            ("perception.dist_noise_std", self.perception.dist_noise_std),
            ("perception.action_noise_std", self.perception.action_noise_std),
            ("evolution.init_sigma", self.evolution.init_sigma),
            ("evolution.step_sigma", self.evolution.step_sigma),
            ("evolution.step_mu", self.evolution.step_mu),
        ] {
            validate_non_negative(field, value)?;
        }
        validate_range("agent.fov", self.agent.fov, 0.0, 1.0)?;
        validate_range("evolution.momentum", self.evolution.momentum, 0.0, 1.0)?;
        validate_range("evolution.step_sigma", self.evolution.step_sigma, 0.0, 0.5)?;

        validate_positive_number("simulation.agents", self.simulation.agents, 1)?;
        validate_positive_number("simulation.steps", self.simulation.steps, 1)?;
        validate_positive_number("simulation.max_spawn_attempts", self.simulation.max_spawn_attempts, 1)?;
        validate_positive_number("agent.resolution", self.agent.resolution, 2)?;
        validate_positive_number("perception.other_input_size", self.perception.other_input_size, 1)?;
        validate_positive_number("evolution.generations", self.evolution.generations, 1)?;
        validate_positive_number("evolution.episodes", self.evolution.episodes, 1)?;
        validate_positive_number("validation.num_nns", self.validation.num_nns, 1)?;

        if self.evolution.population_size < 2 || self.evolution.population_size % 2 != 0 {
            return Err(NavError::InvalidConfigValueError {
                field: "evolution.population_size".to_string(),
                value: self.evolution.population_size.to_string(),
                reason: "Symmetric sampling needs an even population of at least 2".to_string(),
            });
        }

        if self.resource.positions.is_empty() {
            return Err(NavError::MissingConfigError {
                field: "resource.positions".to_string(),
            });
        }
        for [x, y] in &self.resource.positions {
            if *x < 0.0 || *y < 0.0 || *x > self.arena.width || *y > self.arena.height {
                return Err(NavError::InvalidConfigValueError {
                    field: "resource.positions".to_string(),
                    value: format!("[{}, {}]", x, y),
                    reason: "Patch centre lies outside the arena".to_string(),
                });
            }
        }

        if self.arena.width <= self.agent.radius * 4.0 || self.arena.height <= self.agent.radius * 4.0 {
            return Err(NavError::config(
                "arena",
                "Arena must be wider and taller than four agent radii",
            ));
        }

        if let Some(workers) = self.evolution.workers {
            validate_positive_number("evolution.workers", workers, 1)?;
        }
        if let Some(level) = &self.monitoring.log_level {
            validate_one_of("monitoring.log_level", level, &["trace", "debug", "info", "warn", "error"])?;
        }

        self.architecture().check()
    }
}

impl Validate for ExperimentConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn set_dotted(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let mut parts = key.split('.').peekable();
    let mut current = root;
    while let Some(part) = parts.next() {
        let table = current.as_table_mut().ok_or_else(|| {
            NavError::config("overrides", format!("'{}' does not name a table entry", key))
        })?;
        if parts.peek().is_none() {
            table.insert(part.to_string(), value);
            return Ok(());
        }
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    }
    Err(NavError::config("overrides", "empty override key"))
}

/// Parses `key=value` where `value` is any TOML literal; bare words become strings.
pub fn parse_override(assignment: &str) -> Result<(String, toml::Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| NavError::config("overrides", format!("expected key=value, got '{}'", assignment)))?;
    let key = key.trim();
    validate_non_empty_string("overrides", key)?;
    let raw = raw.trim();
    let value = toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
