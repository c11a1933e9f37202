//! Turns an agent's visual field into controller input.

use crate::domain::model::SimType;
use crate::domain::ports::Observation;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Mapping from ray distance to a salience weight in roughly `[0, 1]`.
///
/// The Weber-Fechner variants (`*WF`) are `a - ln(d) / b`; the bounds in the
/// comments are the weights at the agent radius and at the arena diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistTransform {
    #[default]
    #[serde(rename = "none", alias = "")]
    None,
    #[serde(rename = "minmax")]
    MinMax,
    #[serde(rename = "far")]
    Far,
    /// [0, 1]
    #[serde(rename = "maxWF")]
    MaxWf,
    /// [0.1, 0.9]
    #[serde(rename = "p9WF")]
    P9Wf,
    /// [0.2, 0.8]
    #[serde(rename = "p8WF")]
    P8Wf,
    /// [0.2, 0.9]
    #[serde(rename = "WF")]
    Wf,
    /// [0.25, 0.75]
    #[serde(rename = "mlWF")]
    MlWf,
    /// [0.3, 0.7]
    #[serde(rename = "mWF")]
    MWf,
    /// [0.35, 0.65]
    #[serde(rename = "msWF")]
    MsWf,
    /// [0.4, 0.6]
    #[serde(rename = "sWF")]
    SWf,
    /// [0.45, 0.55]
    #[serde(rename = "ssWF")]
    SsWf,
}

impl DistTransform {
    pub fn is_active(self) -> bool {
        self != DistTransform::None
    }

    pub fn apply(self, distance: f64, min_dist: f64, max_dist: f64) -> f64 {
        let wf = |a: f64, b: f64| a - distance.ln() / b;
        match self {
            DistTransform::None => 1.0,
            DistTransform::MinMax => (distance - min_dist) / (max_dist - min_dist),
            DistTransform::Far => min_dist * 2.0 / distance,
            DistTransform::MaxWf => wf(1.465, 5.0),
            DistTransform::P9Wf => wf(1.29, 6.1),
            DistTransform::P8Wf => wf(1.09, 8.2),
            DistTransform::Wf => wf(1.24, 7.0),
            DistTransform::MlWf => wf(1.0, 9.65),
            DistTransform::MWf => wf(0.9, 12.0),
            DistTransform::MsWf => wf(0.8, 16.0),
            DistTransform::SWf => wf(0.7, 24.0),
            DistTransform::SsWf => wf(0.6, 48.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerceptionParams {
    pub transform: DistTransform,
    pub min_dist: f64,
    pub max_dist: f64,
    pub dist_noise_std: f64,
    pub num_classes: usize,
}

/// Weights each one-hot column by its transformed, noisy, clipped distance.
pub fn weight_by_distance<R: Rng + ?Sized>(
    one_hot: &mut [Vec<f64>],
    distances: &[f64],
    params: &PerceptionParams,
    rng: &mut R,
) -> Vec<f64> {
    let weights: Vec<f64> = distances
        .iter()
        .map(|&d| {
            let w = params.transform.apply(d, params.min_dist, params.max_dist);
            let noise: f64 = rng.sample::<f64, _>(StandardNormal) * params.dist_noise_std;
            let w = w + noise;
            // ln(0) on empty rays saturates to 1 through the clamp; NaN maps to 0.
            if w.is_nan() {
                0.0
            } else {
                w.clamp(0.0, 1.0)
            }
        })
        .collect();

    for row in one_hot.iter_mut() {
        for (value, weight) in row.iter_mut().zip(&weights) {
            *value *= weight;
        }
    }
    weights
}

/// Non-visual controller inputs.
///
/// Walls: `[on_resource]`, plus normalized acceleration when two inputs are
/// configured. Open arena: normalized acceleration when enabled, else zeros.
pub fn other_inputs(
    sim_type: SimType,
    size: usize,
    enabled: bool,
    on_resource: bool,
    acceleration: f64,
    max_velocity: f64,
) -> Vec<f64> {
    let accel = if max_velocity > 0.0 {
        acceleration / max_velocity
    } else {
        0.0
    };
    let mut inputs = match sim_type {
        SimType::Walls => {
            let mut v = vec![if on_resource { 1.0 } else { 0.0 }];
            if size >= 2 {
                v.push(accel);
            }
            v
        }
        SimType::NoWalls if enabled => vec![accel],
        SimType::NoWalls => vec![0.0],
    };
    inputs.resize(size, 0.0);
    inputs
}

pub fn build_observation<R: Rng + ?Sized>(
    one_hot: Vec<Vec<f64>>,
    distances: Option<&[f64]>,
    other: Vec<f64>,
    params: &PerceptionParams,
    rng: &mut R,
) -> Observation {
    let mut visual = one_hot;
    if params.transform.is_active() {
        if let Some(distances) = distances {
            weight_by_distance(&mut visual, distances, params, rng);
        }
    }
    Observation { visual, other }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_transform_names_parse() {
        #[derive(Deserialize)]
        struct Holder {
            t: DistTransform,
        }
        let h: Holder = toml::from_str("t = \"p9WF\"").unwrap();
        assert_eq!(h.t, DistTransform::P9Wf);
        let h: Holder = toml::from_str("t = \"\"").unwrap();
        assert_eq!(h.t, DistTransform::None);
    }

    #[test]
    fn test_maxwf_bounds() {
        // Roughly 1 at the agent radius, 0 at the diagonal of a 1000 x 1000 arena.
        let near = DistTransform::MaxWf.apply(10.0, 10.0, 1414.2);
        let far = DistTransform::MaxWf.apply(1414.2, 10.0, 1414.2);
        assert!((near - 1.0).abs() < 0.01);
        assert!(far.abs() < 0.02);
    }

    #[test]
    fn test_weighting_clips_and_scales() {
        let params = PerceptionParams {
            transform: DistTransform::MinMax,
            min_dist: 0.0,
            max_dist: 100.0,
            dist_noise_std: 0.0,
            num_classes: 2,
        };
        let mut one_hot = vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]];
        let mut rng = StdRng::seed_from_u64(3);
        let weights = weight_by_distance(&mut one_hot, &[50.0, 25.0, 200.0], &params, &mut rng);
        assert_eq!(weights, vec![0.5, 0.25, 1.0]);
        assert_eq!(one_hot, vec![vec![0.5, 0.0, 1.0], vec![0.0, 0.25, 0.0]]);
    }

    #[test]
    fn test_empty_ray_saturates_log_weight() {
        let params = PerceptionParams {
            transform: DistTransform::MaxWf,
            min_dist: 10.0,
            max_dist: 1414.2,
            dist_noise_std: 0.0,
            num_classes: 1,
        };
        let mut one_hot = vec![vec![0.0, 1.0]];
        let mut rng = StdRng::seed_from_u64(3);
        let weights = weight_by_distance(&mut one_hot, &[0.0, 0.0], &params, &mut rng);
        assert_eq!(weights, vec![1.0, 1.0]);
        assert_eq!(one_hot, vec![vec![0.0, 1.0]]);
    }

    #[test]
    fn test_other_inputs() {
        assert_eq!(other_inputs(SimType::Walls, 1, true, true, 1.0, 2.0), vec![1.0]);
        assert_eq!(other_inputs(SimType::Walls, 2, true, false, 1.0, 2.0), vec![0.0, 0.5]);
        assert_eq!(other_inputs(SimType::NoWalls, 1, true, false, -1.0, 2.0), vec![-0.5]);
        assert_eq!(other_inputs(SimType::NoWalls, 1, false, false, -1.0, 2.0), vec![0.0]);
    }
}
