use std::path::Path;

use ndarray::{Array, Array1, Array2, ArrayView2, Axis, Dimension, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AgentError, RebalancerResult, SystemError},
    io,
};

// ================================================================================================
// Configuration
// ================================================================================================

pub const DEFAULT_HIDDEN_LAYERS: usize = 1;
pub const DEFAULT_HIDDEN_DIM: usize = 32;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub hidden_layers: usize,
    pub hidden_dim: usize,
    pub learning_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: DEFAULT_HIDDEN_LAYERS,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

impl NetworkConfig {
    pub fn with_hidden_layers(self, hidden_layers: usize) -> Self {
        Self {
            hidden_layers,
            ..self
        }
    }

    pub fn with_hidden_dim(self, hidden_dim: usize) -> Self {
        Self { hidden_dim, ..self }
    }

    pub fn with_learning_rate(self, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..self
        }
    }

    pub fn validate(&self) -> RebalancerResult<()> {
        if self.hidden_dim == 0 {
            return Err(AgentError::InvalidConfig("hidden_dim must be positive".to_string()).into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AgentError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ))
            .into());
        }
        Ok(())
    }
}

// ================================================================================================
// Multi-Layer Perceptron
// ================================================================================================

/// Fully connected layer `x·W + b`, with `W` shaped `(inputs, outputs)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.random_range(-bound..bound)),
            bias: Array1::from_shape_fn(outputs, |_| rng.random_range(-bound..bound)),
        }
    }

    fn forward(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.bias
    }
}

/// Feed-forward network with ReLU hidden layers and a linear output layer.
///
/// Only the parameters are serializable; see [`QNetwork`] for the trainable wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
}

impl Mlp {
    pub fn new<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        cfg: &NetworkConfig,
        rng: &mut R,
    ) -> RebalancerResult<Self> {
        cfg.validate()?;
        if input_dim == 0 || output_dim == 0 {
            return Err(AgentError::InvalidConfig(format!(
                "network dimensions must be positive, got {input_dim} -> {output_dim}"
            ))
            .into());
        }

        let mut widths = Vec::with_capacity(cfg.hidden_layers + 2);
        widths.push(input_dim);
        widths.extend(std::iter::repeat_n(cfg.hidden_dim, cfg.hidden_layers));
        widths.push(output_dim);

        let layers = widths
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], rng))
            .collect();

        Ok(Self { layers })
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.ncols())
    }

    pub fn predict(&self, states: ArrayView2<'_, f64>) -> RebalancerResult<Array2<f64>> {
        self.check_input(states)?;
        let last = self.last_layer()?;
        let mut x = states.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x.view());
            if i < last {
                x.mapv_inplace(relu);
            }
        }
        Ok(x)
    }

    /// Forward pass that keeps every layer input, followed by backpropagation of the
    /// mean-squared error. Returns the loss and per-layer `(dW, db)`.
    fn loss_and_gradients(
        &self,
        states: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> RebalancerResult<(f64, Vec<(Array2<f64>, Array1<f64>)>)> {
        let last = self.last_layer()?;

        // inputs[i] is what layer i sees
        let mut inputs: Vec<Array2<f64>> = Vec::with_capacity(self.layers.len());
        let mut x = states.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(x.view());
            inputs.push(x);
            x = if i < last { z.mapv(relu) } else { z };
        }

        let diff = &x - &targets;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);

        let mut grad = diff * (2.0 / x.len() as f64);
        let mut grads = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let d_weights = inputs[i].t().dot(&grad);
            let d_bias = grad.sum_axis(Axis(0));
            if i > 0 {
                let mut upstream = grad.dot(&layer.weights.t());
                Zip::from(&mut upstream)
                    .and(&inputs[i])
                    .for_each(|g, &a| {
                        if a <= 0.0 {
                            *g = 0.0;
                        }
                    });
                grad = upstream;
            }
            grads.push((d_weights, d_bias));
        }
        grads.reverse();

        Ok((loss, grads))
    }

    fn last_layer(&self) -> RebalancerResult<usize> {
        self.layers.len().checked_sub(1).ok_or_else(|| {
            SystemError::InvariantViolation("network has no layers".to_string()).into()
        })
    }

    fn check_input(&self, states: ArrayView2<'_, f64>) -> RebalancerResult<()> {
        if states.ncols() != self.input_dim() {
            return Err(AgentError::ShapeMismatch {
                context: "network input",
                expected: self.input_dim(),
                actual: states.ncols(),
            }
            .into());
        }
        Ok(())
    }
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

// ================================================================================================
// Adam
// ================================================================================================

pub const ADAM_BETA1: f64 = 0.9;
pub const ADAM_BETA2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-8;

/// Adam optimizer state. First and second moments are kept per parameter tensor and are
/// never persisted.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    moments: Vec<Moments>,
}

#[derive(Debug, Clone)]
struct Moments {
    m_weights: Array2<f64>,
    v_weights: Array2<f64>,
    m_bias: Array1<f64>,
    v_bias: Array1<f64>,
}

impl Adam {
    pub fn new(model: &Mlp, learning_rate: f64) -> Self {
        let moments = model
            .layers
            .iter()
            .map(|l| Moments {
                m_weights: Array2::zeros(l.weights.raw_dim()),
                v_weights: Array2::zeros(l.weights.raw_dim()),
                m_bias: Array1::zeros(l.bias.raw_dim()),
                v_bias: Array1::zeros(l.bias.raw_dim()),
            })
            .collect();

        Self {
            learning_rate,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            epsilon: ADAM_EPSILON,
            t: 0,
            moments,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn step(&mut self, model: &mut Mlp, grads: &[(Array2<f64>, Array1<f64>)]) {
        self.t = self.t.saturating_add(1);
        let step = AdamStep {
            lr: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            bias_correction1: 1.0 - self.beta1.powi(self.t),
            bias_correction2: 1.0 - self.beta2.powi(self.t),
        };

        for ((layer, moments), (d_weights, d_bias)) in
            model.layers.iter_mut().zip(&mut self.moments).zip(grads)
        {
            step.apply(
                &mut layer.weights,
                d_weights,
                &mut moments.m_weights,
                &mut moments.v_weights,
            );
            step.apply(&mut layer.bias, d_bias, &mut moments.m_bias, &mut moments.v_bias);
        }
    }
}

struct AdamStep {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    bias_correction1: f64,
    bias_correction2: f64,
}

impl AdamStep {
    fn apply<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
    ) {
        Zip::from(param)
            .and(grad)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.bias_correction1;
                let v_hat = *v / self.bias_correction2;
                *p -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}

// ================================================================================================
// Q-Network
// ================================================================================================

/// Trainable Q-value approximator: an [`Mlp`] plus its [`Adam`] state.
#[derive(Debug, Clone)]
pub struct QNetwork {
    model: Mlp,
    optimizer: Adam,
}

impl QNetwork {
    pub fn new<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        cfg: &NetworkConfig,
        rng: &mut R,
    ) -> RebalancerResult<Self> {
        let model = Mlp::new(input_dim, output_dim, cfg, rng)?;
        let optimizer = Adam::new(&model, cfg.learning_rate);
        Ok(Self { model, optimizer })
    }

    pub fn model(&self) -> &Mlp {
        &self.model
    }

    pub fn input_dim(&self) -> usize {
        self.model.input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.model.output_dim()
    }

    /// Q-values for a batch of states, shaped `(batch, actions)`.
    pub fn predict(&self, states: ArrayView2<'_, f64>) -> RebalancerResult<Array2<f64>> {
        self.model.predict(states)
    }

    /// One optimizer step on the mean-squared error between `predict(states)` and `targets`,
    /// averaged over every element. Returns the loss before the update.
    pub fn train_step(
        &mut self,
        states: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> RebalancerResult<f64> {
        self.model.check_input(states)?;
        if states.nrows() == 0 {
            return Err(AgentError::InvalidInput("Cannot train on an empty batch".to_string()).into());
        }
        if targets.dim() != (states.nrows(), self.output_dim()) {
            return Err(AgentError::ShapeMismatch {
                context: "network targets",
                expected: states.nrows() * self.output_dim(),
                actual: targets.len(),
            }
            .into());
        }

        let (loss, grads) = self.model.loss_and_gradients(states, targets)?;
        self.optimizer.step(&mut self.model, &grads);
        Ok(loss)
    }

    /// Persist the parameters. Optimizer moments are not saved.
    pub fn save(&self, path: &Path) -> RebalancerResult<()> {
        io::save(path, &self.model)
    }

    /// Replace the parameters with the ones stored at `path` and restart the optimizer.
    ///
    /// The stored network must have the same input and output dimensions as this one.
    pub fn load(&mut self, path: &Path) -> RebalancerResult<()> {
        let model: Mlp = io::load(path)?;
        if model.input_dim() != self.input_dim() {
            return Err(AgentError::ShapeMismatch {
                context: "loaded network input",
                expected: self.input_dim(),
                actual: model.input_dim(),
            }
            .into());
        }
        if model.output_dim() != self.output_dim() {
            return Err(AgentError::ShapeMismatch {
                context: "loaded network output",
                expected: self.output_dim(),
                actual: model.output_dim(),
            }
            .into());
        }

        self.optimizer = Adam::new(&model, self.optimizer.learning_rate());
        self.model = model;
        Ok(())
    }
}
