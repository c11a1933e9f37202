pub mod baseline;
pub mod evolution;
pub mod single_run;
pub mod sweep;
pub mod validation;

use crate::core::controller::NeuralController;
use crate::core::network::{Architecture, WorldModel};
use crate::core::simulation::{SimParams, Simulation};
use crate::domain::model::EpisodeOutcome;
use crate::domain::ports::{Controller, Storage};
use crate::utils::error::{NavError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use baseline::BaselineExperiment;
pub use evolution::EvolutionExperiment;
pub use single_run::SingleRunExperiment;
pub use sweep::SweepRunner;
pub use validation::ValidationExperiment;

pub fn neural_controller(arch: &Architecture, params: &[f64]) -> Result<Box<dyn Controller>> {
    let model = WorldModel::new(arch.clone(), params)?;
    Ok(Box::new(NeuralController::new(Arc::new(model))))
}

/// Runs every controller on every seed, at most `semaphore` simulations at a
/// time. Results are indexed `[controller][seed]`.
pub async fn run_batch(
    params: &SimParams,
    controllers: &[Box<dyn Controller>],
    seeds: &[u64],
    semaphore: Arc<Semaphore>,
) -> Result<Vec<Vec<EpisodeOutcome>>> {
    let mut handles = Vec::with_capacity(controllers.len() * seeds.len());
    for controller in controllers {
        for &seed in seeds {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| NavError::SimulationError {
                    message: format!("worker pool closed: {}", e),
                })?;
            let sim = Simulation::new(params.clone(), controller.fresh());
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                sim.run(seed).map(|(outcome, _)| outcome)
            }));
        }
    }

    let mut outcomes = Vec::with_capacity(controllers.len());
    let mut row = Vec::with_capacity(seeds.len());
    for handle in handles {
        row.push(handle.await??);
        if row.len() == seeds.len() {
            outcomes.push(std::mem::replace(&mut row, Vec::with_capacity(seeds.len())));
        }
    }
    Ok(outcomes)
}

pub(crate) async fn write_json<S: Storage, T: serde::Serialize + ?Sized>(
    storage: &S,
    path: &str,
    value: &T,
) -> Result<()> {
    let data = serde_json::to_vec(value)?;
    storage.write_file(path, &data).await
}

pub(crate) async fn read_json<S: Storage, T: serde::de::DeserializeOwned>(storage: &S, path: &str) -> Result<T> {
    if !storage.exists(path) {
        return Err(NavError::MissingDataError {
            path: path.to_string(),
        });
    }
    let data = storage.read_file(path).await?;
    Ok(serde_json::from_slice(&data)?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::RandomWalk;
    use test_support::tiny_walls_config;

    #[tokio::test]
    async fn test_batch_shape_and_determinism() {
        let config = tiny_walls_config("unused");
        let params = config.sim_params();
        let controllers: Vec<Box<dyn Controller>> =
            vec![Box::new(RandomWalk::new(0.5)), Box::new(RandomWalk::new(0.1))];
        let semaphore = Arc::new(Semaphore::new(2));

        let first = run_batch(&params, &controllers, &[1, 2, 3], semaphore.clone()).await.unwrap();
        let second = run_batch(&params, &controllers, &[1, 2, 3], semaphore).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|row| row.len() == 3));
        for (a, b) in first.iter().flatten().zip(second.iter().flatten()) {
            assert_eq!(a.steps, b.steps);
            assert_eq!(a.seed, b.seed);
        }
    }

    #[test]
    fn test_neural_controller_rejects_wrong_length() {
        let config = tiny_walls_config("unused");
        assert!(neural_controller(&config.architecture(), &[0.0; 3]).is_err());
    }
}
