use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavioral mode of an agent during a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Explore,
    Exploit,
    Collide,
}

impl Mode {
    /// Numeric code used in trajectory exports.
    pub fn code(self) -> u8 {
        match self {
            Mode::Explore => 0,
            Mode::Exploit => 1,
            Mode::Collide => 2,
        }
    }
}

/// What a single visual ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptClass {
    WallNorth,
    WallSouth,
    WallEast,
    WallWest,
    AgentExplore,
    AgentExploit,
    Obstacle,
}

impl PerceptClass {
    /// Row of this class in the one-hot encoding for `num_classes` rows.
    pub fn encoding_index(self, num_classes: usize) -> Option<usize> {
        match (num_classes, self) {
            (2, PerceptClass::AgentExplore) => Some(0),
            (2, PerceptClass::AgentExploit) => Some(1),
            (4 | 6, PerceptClass::WallNorth) => Some(0),
            (4 | 6, PerceptClass::WallSouth) => Some(1),
            (4 | 6, PerceptClass::WallEast) => Some(2),
            (4 | 6, PerceptClass::WallWest) => Some(3),
            (6, PerceptClass::AgentExplore) => Some(4),
            (6, PerceptClass::AgentExploit) => Some(5),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimType {
    /// Single target patch in a walled arena; the episode ends on arrival.
    Walls,
    /// Open arena foraging; the episode always runs to the horizon.
    NoWalls,
}

impl SimType {
    pub fn has_walls(self) -> bool {
        matches!(self, SimType::Walls)
    }

    /// Lower fitness is better for target finding.
    pub fn minimizes(self) -> bool {
        matches!(self, SimType::Walls)
    }

    /// Rows of the one-hot visual encoding.
    pub fn num_percept_classes(self, num_agents: usize) -> usize {
        match self {
            SimType::Walls if num_agents == 1 => 4,
            SimType::Walls => 6,
            SimType::NoWalls => 2,
        }
    }
}

impl fmt::Display for SimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimType::Walls => write!(f, "walls"),
            SimType::NoWalls => write!(f, "nowalls"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    Mean,
    Median,
}

impl Estimator {
    pub fn estimate(self, values: &[f64]) -> f64 {
        match self {
            Estimator::Mean => mean(values),
            Estimator::Median => median(values),
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Result of one simulated episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub seed: u64,
    pub steps: usize,
    /// Distance from the first agent to the first patch, 0 when it was reached.
    pub distance_to_patch: f64,
    pub resources_collected: f64,
    pub first_consume_step: usize,
    pub elapsed_secs: f64,
}

impl EpisodeOutcome {
    pub fn fitness(&self, sim_type: SimType) -> f64 {
        match sim_type {
            SimType::Walls if self.distance_to_patch == 0.0 => self.steps as f64,
            SimType::Walls => (self.steps as f64 + self.distance_to_patch).trunc(),
            SimType::NoWalls => self.resources_collected.trunc(),
        }
    }

    /// Score used when re-running saved controllers: time taken for target
    /// finding, units collected for foraging.
    pub fn validation_score(&self, sim_type: SimType) -> f64 {
        match sim_type {
            SimType::Walls => self.steps as f64,
            SimType::NoWalls => self.resources_collected.trunc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentFrame {
    pub agent: usize,
    pub step: usize,
    pub x: f64,
    pub y: f64,
    pub mode: u8,
    pub collected: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub patch: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// Positions are eye points with the y axis flipped to the plotting frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub frames: Vec<AgentFrame>,
    pub patches: Vec<PatchRecord>,
}

impl Trajectory {
    pub fn frames_for(&self, agent: usize) -> impl Iterator<Item = &AgentFrame> {
        self.frames.iter().filter(move |f| f.agent == agent)
    }

    pub fn steps_recorded(&self) -> usize {
        self.frames.iter().map(|f| f.step + 1).max().unwrap_or(0)
    }
}
