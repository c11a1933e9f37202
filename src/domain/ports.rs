use crate::utils::error::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use serde_json::Value;
use std::collections::HashMap;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> bool;
}

/// Sensory input handed to a controller for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// `classes x rays`, one-hot (optionally distance-weighted).
    pub visual: Vec<Vec<f64>>,
    pub other: Vec<f64>,
}

/// Maps observations to a turn command in `[-1, 1]`.
pub trait Controller: Send + Sync {
    fn act(&mut self, observation: &Observation, rng: &mut StdRng) -> f64;

    /// A controller with the same parameters and cleared internal state.
    fn fresh(&self) -> Box<dyn Controller>;
}

#[derive(Debug, Clone, Default)]
pub struct ExperimentReport {
    pub name: String,
    pub output_path: String,
    pub summary: HashMap<String, Value>,
}

#[async_trait]
pub trait Experiment: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> Result<ExperimentReport>;
}
