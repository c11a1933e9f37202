//! Policy gradients with parameter-based exploration.
//!
//! Symmetric (antithetic) sampling around a Gaussian search distribution,
//! centered-rank fitness shaping and ClipUp updates of the center. The
//! optimizer maximizes; callers flip the sign of costs.

use crate::utils::error::{NavError, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PgpeSettings {
    pub popsize: usize,
    pub stdev_init: f64,
    pub center_learning_rate: f64,
    pub stdev_learning_rate: f64,
    /// Largest relative change of any stdev entry per update.
    pub stdev_max_change: f64,
    pub momentum: f64,
    pub max_speed: f64,
}

impl PgpeSettings {
    /// Settings used for controller evolution: ClipUp speed pinned to twice the
    /// center step, stdev change capped at twice the stdev step.
    pub fn clipup(popsize: usize, init_sigma: f64, step_mu: f64, step_sigma: f64, momentum: f64) -> Self {
        Self {
            popsize,
            stdev_init: init_sigma,
            center_learning_rate: step_mu,
            stdev_learning_rate: step_sigma,
            stdev_max_change: step_sigma * 2.0,
            momentum,
            max_speed: step_mu * 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pgpe {
    settings: PgpeSettings,
    center: Vec<f64>,
    stdev: Vec<f64>,
    velocity: Vec<f64>,
    generation: usize,
    #[serde(skip)]
    pending: Option<Vec<Vec<f64>>>,
}

impl Pgpe {
    pub fn new(solution_length: usize, settings: PgpeSettings) -> Result<Self> {
        if settings.popsize < 2 || settings.popsize % 2 != 0 {
            return Err(NavError::InvalidConfigValueError {
                field: "evolution.population_size".to_string(),
                value: settings.popsize.to_string(),
                reason: "symmetric sampling needs an even population of at least 2".to_string(),
            });
        }
        if solution_length == 0 {
            return Err(NavError::ArchitectureError {
                message: "cannot optimize an empty parameter vector".to_string(),
            });
        }
        Ok(Self {
            settings,
            center: vec![0.0; solution_length],
            stdev: vec![settings.stdev_init; solution_length],
            velocity: vec![0.0; solution_length],
            generation: 0,
            pending: None,
        })
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn stdev(&self) -> &[f64] {
        &self.stdev
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn settings(&self) -> &PgpeSettings {
        &self.settings
    }

    /// Samples a population laid out as `[c + e0, c - e0, c + e1, c - e1, ...]`.
    pub fn ask<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Vec<f64>> {
        let pairs = self.settings.popsize / 2;
        let noises: Vec<Vec<f64>> = (0..pairs)
            .map(|_| {
                self.stdev
                    .iter()
                    .map(|&s| rng.sample::<f64, _>(StandardNormal) * s)
                    .collect()
            })
            .collect();

        let mut population = Vec::with_capacity(self.settings.popsize);
        for noise in &noises {
            population.push(self.center.iter().zip(noise).map(|(c, e)| c + e).collect());
            population.push(self.center.iter().zip(noise).map(|(c, e)| c - e).collect());
        }
        self.pending = Some(noises);
        population
    }

    /// Updates the search distribution from the fitnesses of the last `ask`.
    pub fn tell(&mut self, fitnesses: &[f64]) -> Result<()> {
        if fitnesses.len() != self.settings.popsize {
            return Err(NavError::EvolutionError {
                generation: self.generation,
                message: format!(
                    "expected {} fitnesses, got {}",
                    self.settings.popsize,
                    fitnesses.len()
                ),
            });
        }
        let noises = self.pending.take().ok_or_else(|| NavError::EvolutionError {
            generation: self.generation,
            message: "tell called without a preceding ask".to_string(),
        })?;

        let ranked = centered_ranks(fitnesses);
        let baseline = ranked.iter().sum::<f64>() / ranked.len() as f64;
        let n = self.center.len();
        let pairs = noises.len() as f64;

        let mut grad_center = vec![0.0; n];
        let mut grad_stdev = vec![0.0; n];
        for (k, noise) in noises.iter().enumerate() {
            let f_plus = ranked[2 * k];
            let f_minus = ranked[2 * k + 1];
            let diff = (f_plus - f_minus) / 2.0;
            let avg = (f_plus + f_minus) / 2.0 - baseline;
            for i in 0..n {
                let s = self.stdev[i];
                grad_center[i] += diff * noise[i] / pairs;
                grad_stdev[i] += avg * (noise[i] * noise[i] - s * s) / s / pairs;
            }
        }

        self.clipup_step(&grad_center);

        let lr = self.settings.stdev_learning_rate;
        let max_change = self.settings.stdev_max_change;
        for (s, g) in self.stdev.iter_mut().zip(&grad_stdev) {
            let updated = *s + lr * g;
            *s = updated.clamp(*s * (1.0 - max_change), *s * (1.0 + max_change));
        }

        self.generation += 1;
        Ok(())
    }

    fn clipup_step(&mut self, gradient: &[f64]) {
        let norm = l2(gradient);
        if norm > 0.0 {
            let scale = self.settings.center_learning_rate / norm;
            for (v, g) in self.velocity.iter_mut().zip(gradient) {
                *v = self.settings.momentum * *v + g * scale;
            }
        } else {
            for v in self.velocity.iter_mut() {
                *v *= self.settings.momentum;
            }
        }

        let speed = l2(&self.velocity);
        if speed > self.settings.max_speed {
            let shrink = self.settings.max_speed / speed;
            self.velocity.iter_mut().for_each(|v| *v *= shrink);
        }

        for (c, v) in self.center.iter_mut().zip(&self.velocity) {
            *c += v;
        }
    }
}

fn l2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Ranks scaled to `[-0.5, 0.5]`, lowest fitness first. Ties keep input order.
pub fn centered_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; n];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = rank as f64 / (n - 1) as f64 - 0.5;
    }
    ranks
}
