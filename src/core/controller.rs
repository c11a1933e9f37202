use crate::core::network::WorldModel;
use crate::domain::ports::{Controller, Observation};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;

/// Ignores its input and turns uniformly at random.
#[derive(Debug, Clone, Copy)]
pub struct RandomWalk {
    max_turn: f64,
}

impl RandomWalk {
    pub fn new(max_turn: f64) -> Self {
        Self { max_turn: max_turn.abs() }
    }
}

impl Controller for RandomWalk {
    fn act(&mut self, _observation: &Observation, rng: &mut StdRng) -> f64 {
        if self.max_turn == 0.0 {
            return 0.0;
        }
        rng.gen_range(-self.max_turn..=self.max_turn)
    }

    fn fresh(&self) -> Box<dyn Controller> {
        Box::new(*self)
    }
}

/// Evolved network with per-agent hidden state.
#[derive(Debug, Clone)]
pub struct NeuralController {
    model: Arc<WorldModel>,
    hidden: Vec<f64>,
}

impl NeuralController {
    pub fn new(model: Arc<WorldModel>) -> Self {
        let hidden = model.initial_hidden();
        Self { model, hidden }
    }

    pub fn hidden(&self) -> &[f64] {
        &self.hidden
    }
}

impl Controller for NeuralController {
    fn act(&mut self, observation: &Observation, _rng: &mut StdRng) -> f64 {
        let output = self.model.forward(observation, &mut self.hidden);
        output.first().copied().unwrap_or(0.0)
    }

    fn fresh(&self) -> Box<dyn Controller> {
        Box::new(NeuralController::new(Arc::clone(&self.model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::network::{param_count, Activation, Architecture, CoreType};
    use rand::SeedableRng;

    fn empty_observation() -> Observation {
        Observation {
            visual: vec![vec![0.0; 4]; 2],
            other: vec![0.0],
        }
    }

    #[test]
    fn test_random_walk_stays_in_range() {
        let mut walk = RandomWalk::new(0.5);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let a = walk.act(&empty_observation(), &mut rng);
            assert!((-0.5..=0.5).contains(&a));
        }
        assert_eq!(RandomWalk::new(0.0).act(&empty_observation(), &mut rng), 0.0);
    }

    #[test]
    fn test_fresh_neural_controller_clears_hidden_state() {
        let arch = Architecture {
            input_channels: 2,
            input_length: 4,
            cnn_depths: vec![1],
            cnn_dims: vec![2],
            kernel_size: 3,
            other_input_size: 1,
            hidden_size: 3,
            output_size: 1,
            activation: Activation::Tanh,
            core: CoreType::Rnn,
        };
        let params = vec![0.3; param_count(&arch)];
        let model = Arc::new(WorldModel::new(arch, &params).unwrap());
        let mut controller = NeuralController::new(model);
        let mut rng = StdRng::seed_from_u64(0);

        let first = controller.act(&empty_observation(), &mut rng);
        assert_ne!(controller.hidden(), &[0.0, 0.0, 0.0]);

        let mut reset = controller.fresh();
        assert_eq!(reset.act(&empty_observation(), &mut rng), first);
    }
}
