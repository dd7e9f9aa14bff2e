use serde::{Deserialize, Serialize};

/// Activation shape flowing between layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `[steps][channels]`, step-major.
    Sequence { steps: usize, channels: usize },
    Vector { len: usize },
}

impl Shape {
    pub fn len(&self) -> usize {
        match *self {
            Shape::Sequence { steps, channels } => steps * channels,
            Shape::Vector { len } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the innermost axis.
    fn features(&self) -> usize {
        match *self {
            Shape::Sequence { channels, .. } => channels,
            Shape::Vector { len } => len,
        }
    }

    fn with_features(&self, features: usize) -> Shape {
        match *self {
            Shape::Sequence { steps, .. } => Shape::Sequence {
                steps,
                channels: features,
            },
            Shape::Vector { .. } => Shape::Vector { len: features },
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Sequence { steps, channels } => write!(f, "({steps}, {channels})"),
            Shape::Vector { len } => write!(f, "({len},)"),
        }
    }
}

/// Dense activation values with their shape.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub shape: Shape,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(self, values: &mut [f32]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Sigmoid => values.iter_mut().for_each(|v| *v = sigmoid(*v)),
            Activation::Softmax => {
                let probs = crate::ml::softmax(values);
                values.copy_from_slice(&probs);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

impl Padding {
    /// Output length and leading pad for a sliding window.
    fn window(self, len: usize, size: usize, stride: usize) -> Option<(usize, usize)> {
        match self {
            Padding::Valid => (len >= size).then(|| ((len - size) / stride + 1, 0)),
            Padding::Same => {
                let out = len.div_ceil(stride);
                let total = ((out.saturating_sub(1)) * stride + size).saturating_sub(len);
                (out > 0).then_some((out, total / 2))
            }
        }
    }
}

fn one() -> usize {
    1
}

fn default_epsilon() -> f32 {
    1e-3
}

/// Inference-only layers with Keras weight layouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    /// `kernel` is `[kernel_size][in_channels][filters]`.
    Conv1d {
        kernel: Vec<Vec<Vec<f32>>>,
        bias: Vec<f32>,
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default)]
        activation: Activation,
    },
    MaxPool1d {
        pool_size: usize,
        /// Defaults to `pool_size`.
        #[serde(default)]
        stride: Option<usize>,
        #[serde(default)]
        padding: Padding,
    },
    /// Frozen batch normalization over the innermost axis.
    BatchNorm {
        gamma: Vec<f32>,
        beta: Vec<f32>,
        moving_mean: Vec<f32>,
        moving_variance: Vec<f32>,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    /// `kernel` is `[in][4 * units]`, `recurrent_kernel` is `[units][4 * units]`, gate
    /// blocks ordered input, forget, cell, output.
    Lstm {
        units: usize,
        kernel: Vec<Vec<f32>>,
        recurrent_kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
        #[serde(default)]
        return_sequences: bool,
    },
    Flatten,
    GlobalAveragePool1d,
    /// `kernel` is `[in][units]`; on sequences it applies per step.
    Dense {
        kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
        #[serde(default)]
        activation: Activation,
    },
    Dropout,
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Conv1d { .. } => "conv1d",
            Layer::MaxPool1d { .. } => "max_pool1d",
            Layer::BatchNorm { .. } => "batch_norm",
            Layer::Lstm { .. } => "lstm",
            Layer::Flatten => "flatten",
            Layer::GlobalAveragePool1d => "global_average_pool1d",
            Layer::Dense { .. } => "dense",
            Layer::Dropout => "dropout",
        }
    }

    /// Static shape inference; also checks that weight dimensions agree with the input.
    pub fn output_shape(&self, input: Shape) -> Result<Shape, String> {
        match self {
            Layer::Conv1d {
                kernel,
                bias,
                stride,
                padding,
                ..
            } => {
                let Shape::Sequence { steps, channels } = input else {
                    return Err(format!("expects a sequence, got {input}"));
                };
                let size = kernel.len();
                let filters = bias.len();
                if size == 0 || filters == 0 || *stride == 0 {
                    return Err("empty kernel, bias or zero stride".to_string());
                }
                for tap in kernel {
                    if tap.len() != channels || tap.iter().any(|row| row.len() != filters) {
                        return Err(format!(
                            "kernel does not match ({size}, {channels}, {filters})"
                        ));
                    }
                }
                let (steps, _) = padding
                    .window(steps, size, *stride)
                    .ok_or_else(|| format!("window {size} does not fit {steps} steps"))?;
                Ok(Shape::Sequence {
                    steps,
                    channels: filters,
                })
            }
            Layer::MaxPool1d {
                pool_size,
                stride,
                padding,
            } => {
                let Shape::Sequence { steps, channels } = input else {
                    return Err(format!("expects a sequence, got {input}"));
                };
                let stride = stride.unwrap_or(*pool_size);
                if *pool_size == 0 || stride == 0 {
                    return Err("pool size and stride must be > 0".to_string());
                }
                let (steps, _) = padding
                    .window(steps, *pool_size, stride)
                    .ok_or_else(|| format!("pool {pool_size} does not fit {steps} steps"))?;
                Ok(Shape::Sequence { steps, channels })
            }
            Layer::BatchNorm {
                gamma,
                beta,
                moving_mean,
                moving_variance,
                ..
            } => {
                let features = input.features();
                if [gamma, beta, moving_mean, moving_variance]
                    .iter()
                    .any(|param| param.len() != features)
                {
                    return Err(format!("parameters do not match {features} features"));
                }
                if moving_variance.iter().any(|v| *v < 0.0) {
                    return Err("negative moving variance".to_string());
                }
                Ok(input)
            }
            Layer::Lstm {
                units,
                kernel,
                recurrent_kernel,
                bias,
                return_sequences,
            } => {
                let Shape::Sequence { steps, channels } = input else {
                    return Err(format!("expects a sequence, got {input}"));
                };
                let gates = 4 * units;
                if *units == 0
                    || kernel.len() != channels
                    || recurrent_kernel.len() != *units
                    || bias.len() != gates
                    || kernel.iter().chain(recurrent_kernel).any(|row| row.len() != gates)
                {
                    return Err(format!(
                        "weights do not match {channels} inputs and {units} units"
                    ));
                }
                Ok(if *return_sequences {
                    Shape::Sequence {
                        steps,
                        channels: *units,
                    }
                } else {
                    Shape::Vector { len: *units }
                })
            }
            Layer::Flatten => Ok(Shape::Vector { len: input.len() }),
            Layer::GlobalAveragePool1d => match input {
                Shape::Sequence { channels, .. } => Ok(Shape::Vector { len: channels }),
                Shape::Vector { .. } => Err(format!("expects a sequence, got {input}")),
            },
            Layer::Dense { kernel, bias, .. } => {
                let features = input.features();
                if bias.is_empty()
                    || kernel.len() != features
                    || kernel.iter().any(|row| row.len() != bias.len())
                {
                    return Err(format!(
                        "kernel does not match ({features}, {})",
                        bias.len()
                    ));
                }
                Ok(input.with_features(bias.len()))
            }
            Layer::Dropout => Ok(input),
        }
    }

    /// Run the layer. Shapes must already have been checked by [`Layer::output_shape`].
    pub fn forward(&self, input: Tensor) -> Result<Tensor, String> {
        let shape = self.output_shape(input.shape)?;
        let data = match self {
            Layer::Conv1d {
                kernel,
                bias,
                stride,
                padding,
                activation,
            } => conv1d(&input, shape, kernel, bias, *stride, *padding, *activation),
            Layer::MaxPool1d {
                pool_size,
                stride,
                padding,
            } => {
                let stride = stride.unwrap_or(*pool_size);
                max_pool1d(&input, shape, *pool_size, stride, *padding)
            }
            Layer::BatchNorm {
                gamma,
                beta,
                moving_mean,
                moving_variance,
                epsilon,
            } => {
                let features = input.shape.features();
                let mut data = input.data;
                for row in data.chunks_exact_mut(features) {
                    for (f, value) in row.iter_mut().enumerate() {
                        let std = (moving_variance[f] + epsilon).sqrt();
                        *value = gamma[f] * (*value - moving_mean[f]) / std + beta[f];
                    }
                }
                data
            }
            Layer::Lstm {
                units,
                kernel,
                recurrent_kernel,
                bias,
                return_sequences,
            } => lstm(&input, *units, kernel, recurrent_kernel, bias, *return_sequences),
            Layer::Flatten | Layer::Dropout => input.data,
            Layer::GlobalAveragePool1d => {
                let Shape::Sequence { steps, channels } = input.shape else {
                    return Err("global pooling needs a sequence".to_string());
                };
                let mut sums = vec![0.0_f32; channels];
                for row in input.data.chunks_exact(channels) {
                    for (sum, v) in sums.iter_mut().zip(row) {
                        *sum += v;
                    }
                }
                sums.iter().map(|s| s / steps.max(1) as f32).collect()
            }
            Layer::Dense {
                kernel,
                bias,
                activation,
            } => {
                let features = input.shape.features();
                let mut out = Vec::with_capacity(shape.len());
                for row in input.data.chunks_exact(features) {
                    let mut values = bias.clone();
                    for (x, weights) in row.iter().zip(kernel) {
                        for (acc, w) in values.iter_mut().zip(weights) {
                            *acc += x * w;
                        }
                    }
                    activation.apply(&mut values);
                    out.extend(values);
                }
                out
            }
        };
        Ok(Tensor { shape, data })
    }
}

fn conv1d(
    input: &Tensor,
    output: Shape,
    kernel: &[Vec<Vec<f32>>],
    bias: &[f32],
    stride: usize,
    padding: Padding,
    activation: Activation,
) -> Vec<f32> {
    let Shape::Sequence { steps, channels } = input.shape else {
        return Vec::new();
    };
    let out_steps = match output {
        Shape::Sequence { steps, .. } => steps,
        Shape::Vector { .. } => 0,
    };
    let pad = padding
        .window(steps, kernel.len(), stride)
        .map_or(0, |(_, pad)| pad);
    let mut out = Vec::with_capacity(out_steps * bias.len());
    for t in 0..out_steps {
        let mut acc = bias.to_vec();
        for (k, tap) in kernel.iter().enumerate() {
            let Some(src) = (t * stride + k).checked_sub(pad).filter(|&s| s < steps) else {
                continue;
            };
            let x = &input.data[src * channels..(src + 1) * channels];
            for (xi, weights) in x.iter().zip(tap) {
                for (a, w) in acc.iter_mut().zip(weights) {
                    *a += xi * w;
                }
            }
        }
        activation.apply(&mut acc);
        out.extend(acc);
    }
    out
}

fn max_pool1d(
    input: &Tensor,
    output: Shape,
    pool_size: usize,
    stride: usize,
    padding: Padding,
) -> Vec<f32> {
    let Shape::Sequence { steps, channels } = input.shape else {
        return Vec::new();
    };
    let out_steps = match output {
        Shape::Sequence { steps, .. } => steps,
        Shape::Vector { .. } => 0,
    };
    let pad = padding
        .window(steps, pool_size, stride)
        .map_or(0, |(_, pad)| pad);
    let mut out = Vec::with_capacity(out_steps * channels);
    for t in 0..out_steps {
        let mut best = vec![f32::NEG_INFINITY; channels];
        for k in 0..pool_size {
            let Some(src) = (t * stride + k).checked_sub(pad).filter(|&s| s < steps) else {
                continue;
            };
            let row = &input.data[src * channels..(src + 1) * channels];
            for (b, &v) in best.iter_mut().zip(row) {
                *b = b.max(v);
            }
        }
        out.extend(best);
    }
    out
}

fn lstm(
    input: &Tensor,
    units: usize,
    kernel: &[Vec<f32>],
    recurrent_kernel: &[Vec<f32>],
    bias: &[f32],
    return_sequences: bool,
) -> Vec<f32> {
    let Shape::Sequence { channels, .. } = input.shape else {
        return Vec::new();
    };
    let mut h = vec![0.0_f32; units];
    let mut c = vec![0.0_f32; units];
    let mut sequence = Vec::new();
    for x in input.data.chunks_exact(channels) {
        let mut z = bias.to_vec();
        for (xi, weights) in x.iter().zip(kernel) {
            for (zi, w) in z.iter_mut().zip(weights) {
                *zi += xi * w;
            }
        }
        for (hi, weights) in h.iter().zip(recurrent_kernel) {
            for (zi, w) in z.iter_mut().zip(weights) {
                *zi += hi * w;
            }
        }
        for u in 0..units {
            let input_gate = sigmoid(z[u]);
            let forget_gate = sigmoid(z[units + u]);
            let candidate = z[2 * units + u].tanh();
            let output_gate = sigmoid(z[3 * units + u]);
            c[u] = forget_gate * c[u] + input_gate * candidate;
            h[u] = output_gate * c[u].tanh();
        }
        if return_sequences {
            sequence.extend_from_slice(&h);
        }
    }
    if return_sequences { sequence } else { h }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
