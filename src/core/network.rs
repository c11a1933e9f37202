//! Neural world model: 1-D CNN over the visual field, a recurrent core and a
//! tanh output layer.
//!
//! Parameters come as one flat vector laid out layer by layer, each layer as
//! `weight` then `bias`, weights row-major (`[out, in]` for dense layers,
//! `[out, in, kernel]` for convolutions). Recurrent cores store
//! `weight_ih, weight_hh, bias_ih, bias_hh`; GRU gates are ordered `r, z, n`.

use crate::domain::ports::Observation;
use crate::utils::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreType {
    Fnn,
    Rnn,
    #[default]
    Gru,
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreType::Fnn => write!(f, "fnn"),
            CoreType::Rnn => write!(f, "rnn"),
            CoreType::Gru => write!(f, "gru"),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    /// Rows of the visual encoding.
    pub input_channels: usize,
    /// Rays of the visual field.
    pub input_length: usize,
    pub cnn_depths: Vec<usize>,
    pub cnn_dims: Vec<usize>,
    pub kernel_size: usize,
    pub other_input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub activation: Activation,
    pub core: CoreType,
}

impl Architecture {
    pub fn check(&self) -> Result<()> {
        let fail = |message: String| Err(NavError::ArchitectureError { message });
        if self.cnn_depths.len() != self.cnn_dims.len() {
            return fail(format!(
                "cnn_depths has {} blocks but cnn_dims has {}",
                self.cnn_depths.len(),
                self.cnn_dims.len()
            ));
        }
        if self.cnn_dims.is_empty() || self.cnn_dims.contains(&0) {
            return fail("cnn_dims must list at least one non-zero channel count".to_string());
        }
        if self.cnn_depths.contains(&0) {
            return fail("every cnn block needs at least one layer".to_string());
        }
        if self.kernel_size == 0 {
            return fail("kernel_size must be at least 1".to_string());
        }
        if self.input_channels == 0 || self.input_length == 0 {
            return fail("visual input must be non-empty".to_string());
        }
        if self.hidden_size == 0 || self.output_size == 0 {
            return fail("hidden_size and output_size must be non-zero".to_string());
        }
        Ok(())
    }

    /// `(in_channels, out_channels)` of every convolution in order.
    fn conv_shapes(&self) -> Vec<(usize, usize)> {
        let mut shapes = Vec::new();
        let mut channels = self.input_channels;
        for (&depth, &dim) in self.cnn_depths.iter().zip(&self.cnn_dims) {
            for _ in 0..depth {
                shapes.push((channels, dim));
                channels = dim;
            }
        }
        shapes
    }

    fn core_input_size(&self) -> usize {
        self.cnn_dims.last().copied().unwrap_or(0) + self.other_input_size
    }

    fn gates(&self) -> usize {
        match self.core {
            CoreType::Fnn | CoreType::Rnn => 1,
            CoreType::Gru => 3,
        }
    }
}

/// Exact length of the flat parameter vector for `arch`.
pub fn param_count(arch: &Architecture) -> usize {
    let conv: usize = arch
        .conv_shapes()
        .iter()
        .map(|&(cin, cout)| cout * cin * arch.kernel_size + cout)
        .sum();

    let h = arch.hidden_size;
    let i = arch.core_input_size();
    let g = arch.gates();
    let core = match arch.core {
        CoreType::Fnn => h * i + h,
        CoreType::Rnn | CoreType::Gru => g * h * i + g * h * h + 2 * g * h,
    };

    let out = arch.output_size * h + arch.output_size;
    conv + core + out
}

struct Cursor<'a> {
    params: &'a [f64],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Vec<f64> {
        let slice = self.params[self.offset..self.offset + n].to_vec();
        self.offset += n;
        slice
    }
}

#[derive(Debug, Clone)]
struct Conv1d {
    cin: usize,
    cout: usize,
    kernel: usize,
    weight: Vec<f64>,
    bias: Vec<f64>,
}

impl Conv1d {
    /// Same-length convolution; odd padding goes on the right.
    fn forward(&self, input: &[Vec<f64>], activation: Activation) -> Vec<Vec<f64>> {
        let len = input.first().map_or(0, Vec::len);
        let left = (self.kernel - 1) / 2;
        let mut out = vec![vec![0.0; len]; self.cout];
        for (o, row) in out.iter_mut().enumerate() {
            for (t, value) in row.iter_mut().enumerate() {
                let mut acc = self.bias[o];
                for (c, channel) in input.iter().enumerate().take(self.cin) {
                    let base = (o * self.cin + c) * self.kernel;
                    for k in 0..self.kernel {
                        let pos = t + k;
                        if pos < left || pos - left >= len {
                            continue;
                        }
                        acc += self.weight[base + k] * channel[pos - left];
                    }
                }
                *value = activation.apply(acc);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
struct Linear {
    cin: usize,
    cout: usize,
    weight: Vec<f64>,
    bias: Vec<f64>,
}

impl Linear {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.cout)
            .map(|o| {
                let row = &self.weight[o * self.cin..(o + 1) * self.cin];
                self.bias[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Core {
    Fnn(Linear),
    Rnn { ih: Linear, hh: Linear },
    Gru { ih: Linear, hh: Linear, hidden: usize },
}

impl Core {
    fn forward(&self, input: &[f64], hidden: &mut Vec<f64>, activation: Activation) -> Vec<f64> {
        match self {
            Core::Fnn(layer) => layer.forward(input).into_iter().map(|x| activation.apply(x)).collect(),
            Core::Rnn { ih, hh } => {
                let a = ih.forward(input);
                let b = hh.forward(hidden);
                let next: Vec<f64> = a.iter().zip(&b).map(|(x, y)| (x + y).tanh()).collect();
                *hidden = next.clone();
                next
            }
            Core::Gru { ih, hh, hidden: h } => {
                let h = *h;
                let gi = ih.forward(input);
                let gh = hh.forward(hidden);
                let next: Vec<f64> = (0..h)
                    .map(|j| {
                        let r = sigmoid(gi[j] + gh[j]);
                        let z = sigmoid(gi[h + j] + gh[h + j]);
                        let n = (gi[2 * h + j] + r * gh[2 * h + j]).tanh();
                        (1.0 - z) * n + z * hidden[j]
                    })
                    .collect();
                *hidden = next.clone();
                next
            }
        }
    }
}

/// Controller network with its parameters loaded.
#[derive(Debug, Clone)]
pub struct WorldModel {
    arch: Architecture,
    convs: Vec<Conv1d>,
    core: Core,
    output: Linear,
}

impl WorldModel {
    pub fn new(arch: Architecture, params: &[f64]) -> Result<Self> {
        arch.check()?;
        let expected = param_count(&arch);
        if params.len() != expected {
            return Err(NavError::ArchitectureError {
                message: format!(
                    "parameter vector has {} values, architecture needs {}",
                    params.len(),
                    expected
                ),
            });
        }

        let mut cursor = Cursor { params, offset: 0 };
        let k = arch.kernel_size;
        let convs = arch
            .conv_shapes()
            .into_iter()
            .map(|(cin, cout)| Conv1d {
                cin,
                cout,
                kernel: k,
                weight: cursor.take(cout * cin * k),
                bias: cursor.take(cout),
            })
            .collect();

        let h = arch.hidden_size;
        let i = arch.core_input_size();
        let g = arch.gates();
        let core = match arch.core {
            CoreType::Fnn => Core::Fnn(Linear {
                cin: i,
                cout: h,
                weight: cursor.take(h * i),
                bias: cursor.take(h),
            }),
            CoreType::Rnn | CoreType::Gru => {
                let w_ih = cursor.take(g * h * i);
                let w_hh = cursor.take(g * h * h);
                let b_ih = cursor.take(g * h);
                let b_hh = cursor.take(g * h);
                let ih = Linear { cin: i, cout: g * h, weight: w_ih, bias: b_ih };
                let hh = Linear { cin: h, cout: g * h, weight: w_hh, bias: b_hh };
                if arch.core == CoreType::Rnn {
                    Core::Rnn { ih, hh }
                } else {
                    Core::Gru { ih, hh, hidden: h }
                }
            }
        };

        let output = Linear {
            cin: h,
            cout: arch.output_size,
            weight: cursor.take(arch.output_size * h),
            bias: cursor.take(arch.output_size),
        };

        Ok(Self { arch, convs, core, output })
    }

    pub fn architecture(&self) -> &Architecture {
        &self.arch
    }

    pub fn initial_hidden(&self) -> Vec<f64> {
        vec![0.0; self.arch.hidden_size]
    }

    /// One forward pass. `hidden` is read and replaced for recurrent cores.
    pub fn forward(&self, observation: &Observation, hidden: &mut Vec<f64>) -> Vec<f64> {
        let activation = self.arch.activation;
        let mut features = observation.visual.clone();
        for conv in &self.convs {
            features = conv.forward(&features, activation);
        }

        let mut core_input: Vec<f64> = features
            .iter()
            .map(|channel| channel.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect();
        core_input.extend(observation.other.iter().copied());
        core_input.resize(self.arch.core_input_size(), 0.0);

        let core_out = self.core.forward(&core_input, hidden, activation);
        self.output.forward(&core_out).into_iter().map(f64::tanh).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(core: CoreType) -> Architecture {
        Architecture {
            input_channels: 4,
            input_length: 8,
            cnn_depths: vec![1, 1],
            cnn_dims: vec![2, 8],
            kernel_size: 3,
            other_input_size: 1,
            hidden_size: 2,
            output_size: 1,
            activation: Activation::Relu,
            core,
        }
    }

    fn observation() -> Observation {
        let mut visual = vec![vec![0.0; 8]; 4];
        visual[0][2] = 1.0;
        visual[2][5] = 1.0;
        Observation { visual, other: vec![1.0] }
    }

    #[test]
    fn test_param_count_matches_layer_shapes() {
        // conv 4->2: 2*4*3+2 = 26, conv 2->8: 8*2*3+8 = 56
        assert_eq!(param_count(&arch(CoreType::Fnn)), 26 + 56 + (2 * 9 + 2) + (2 + 1));
        assert_eq!(param_count(&arch(CoreType::Rnn)), 26 + 56 + (18 + 4 + 4) + 3);
        assert_eq!(param_count(&arch(CoreType::Gru)), 26 + 56 + (54 + 12 + 12) + 3);
    }

    #[test]
    fn test_wrong_vector_length_is_rejected() {
        let a = arch(CoreType::Gru);
        let err = WorldModel::new(a.clone(), &vec![0.0; param_count(&a) - 1]).unwrap_err();
        assert!(matches!(err, NavError::ArchitectureError { .. }));
    }

    #[test]
    fn test_mismatched_blocks_are_rejected() {
        let mut a = arch(CoreType::Fnn);
        a.cnn_depths = vec![1];
        assert!(a.check().is_err());
    }

    #[test]
    fn test_zero_parameters_give_zero_output() {
        for core in [CoreType::Fnn, CoreType::Rnn, CoreType::Gru] {
            let a = arch(core);
            let model = WorldModel::new(a.clone(), &vec![0.0; param_count(&a)]).unwrap();
            let mut hidden = model.initial_hidden();
            let out = model.forward(&observation(), &mut hidden);
            assert_eq!(out, vec![0.0]);
        }
    }

    #[test]
    fn test_output_is_bounded_and_hidden_evolves() {
        let a = arch(CoreType::Gru);
        let params: Vec<f64> = (0..param_count(&a)).map(|i| ((i % 7) as f64 - 3.0) * 0.5).collect();
        let model = WorldModel::new(a, &params).unwrap();
        let mut hidden = model.initial_hidden();
        let first = model.forward(&observation(), &mut hidden);
        assert!(first[0].abs() <= 1.0);
        assert_ne!(hidden, vec![0.0, 0.0]);
    }

    #[test]
    fn test_same_padding_keeps_length() {
        let conv = Conv1d {
            cin: 1,
            cout: 1,
            kernel: 3,
            weight: vec![1.0, 1.0, 1.0],
            bias: vec![0.0],
        };
        let out = conv.forward(&[vec![1.0, 2.0, 3.0]], Activation::Relu);
        assert_eq!(out, vec![vec![3.0, 6.0, 5.0]]);
    }
}
