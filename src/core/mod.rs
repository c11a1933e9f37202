pub mod agent;
pub mod arena;
pub mod controller;
pub mod engine;
pub mod geometry;
pub mod network;
pub mod perception;
pub mod pgpe;
pub mod resource;
pub mod simulation;

pub use crate::domain::model::{EpisodeOutcome, SimType, Trajectory};
pub use crate::domain::ports::{Controller, Experiment, Observation, Storage};
pub use crate::utils::error::Result;
