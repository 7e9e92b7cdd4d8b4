use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    agent::{
        Agent, AgentIdentifier, RunMode,
        network::{NetworkConfig, QNetwork},
        replay_buffer::{Batch, ReplayBuffer, Transition},
    },
    error::{AgentError, RebalancerResult},
    gym::rebalance::{action::ActionId, observation::Observation},
};

// ================================================================================================
// Configuration
// ================================================================================================

pub const DEFAULT_GAMMA: f64 = 0.95;
pub const DEFAULT_EPSILON: f64 = 1.0;
pub const DEFAULT_EPSILON_MIN: f64 = 0.01;
pub const DEFAULT_EPSILON_DECAY: f64 = 0.995;
pub const DEFAULT_EVAL_EPSILON: f64 = 0.01;
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Discount factor.
    pub gamma: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    pub epsilon_min: f64,
    /// Multiplicative decay applied after every training replay.
    pub epsilon_decay: f64,
    /// Fixed exploration rate used in [`RunMode::Test`].
    pub eval_epsilon: f64,
    pub buffer_capacity: usize,
    pub network: NetworkConfig,
    /// Seed for exploration, sampling and weight init. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            epsilon: DEFAULT_EPSILON,
            epsilon_min: DEFAULT_EPSILON_MIN,
            epsilon_decay: DEFAULT_EPSILON_DECAY,
            eval_epsilon: DEFAULT_EVAL_EPSILON,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            network: NetworkConfig::default(),
            seed: None,
        }
    }
}

impl DqnConfig {
    pub fn with_gamma(self, gamma: f64) -> Self {
        Self { gamma, ..self }
    }

    pub fn with_epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    pub fn with_epsilon_min(self, epsilon_min: f64) -> Self {
        Self {
            epsilon_min,
            ..self
        }
    }

    pub fn with_epsilon_decay(self, epsilon_decay: f64) -> Self {
        Self {
            epsilon_decay,
            ..self
        }
    }

    pub fn with_eval_epsilon(self, eval_epsilon: f64) -> Self {
        Self {
            eval_epsilon,
            ..self
        }
    }

    pub fn with_buffer_capacity(self, buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity,
            ..self
        }
    }

    pub fn with_network(self, network: NetworkConfig) -> Self {
        Self { network, ..self }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    pub fn validate(&self) -> RebalancerResult<()> {
        let unit = |name: &str, v: f64| -> RebalancerResult<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(AgentError::InvalidConfig(format!("{name} must lie in [0, 1], got {v}")).into())
            }
        };
        unit("gamma", self.gamma)?;
        unit("epsilon", self.epsilon)?;
        unit("epsilon_min", self.epsilon_min)?;
        unit("eval_epsilon", self.eval_epsilon)?;

        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon_decay must lie in (0, 1], got {}",
                self.epsilon_decay
            ))
            .into());
        }
        if self.epsilon_min > self.epsilon {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon_min {} exceeds epsilon {}",
                self.epsilon_min, self.epsilon
            ))
            .into());
        }
        if self.buffer_capacity == 0 {
            return Err(
                AgentError::InvalidConfig("buffer_capacity must be positive".to_string()).into(),
            );
        }
        self.network.validate()
    }
}

// ================================================================================================
// DQN Agent
// ================================================================================================

/// Epsilon-greedy deep Q-learning agent with uniform experience replay.
///
/// TD targets bootstrap from the same network that is being trained.
#[derive(Debug, Clone)]
pub struct DqnAgent {
    cfg: DqnConfig,
    network: QNetwork,
    memory: ReplayBuffer,
    epsilon: f64,
    mode: RunMode,
    rng: StdRng,
}

impl DqnAgent {
    pub fn new(obs_dim: usize, n_actions: usize, cfg: DqnConfig) -> RebalancerResult<Self> {
        cfg.validate()?;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            network: QNetwork::new(obs_dim, n_actions, &cfg.network, &mut rng)?,
            memory: ReplayBuffer::new(obs_dim, cfg.buffer_capacity)?,
            epsilon: cfg.epsilon,
            mode: RunMode::Train,
            cfg,
            rng,
        })
    }

    pub fn config(&self) -> &DqnConfig {
        &self.cfg
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn n_actions(&self) -> usize {
        self.network.output_dim()
    }

    pub fn network(&self) -> &QNetwork {
        &self.network
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    /// Switch the run mode. Entering [`RunMode::Test`] pins epsilon to the evaluation rate.
    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
        if !mode.is_train() {
            self.epsilon = self.cfg.eval_epsilon;
        }
    }

    pub fn act(&mut self, obs: &Observation) -> RebalancerResult<ActionId> {
        if self.rng.random::<f64>() < self.epsilon {
            return Ok(ActionId(self.rng.random_range(0..self.n_actions())));
        }

        let q = self.network.predict(obs.view().insert_axis(Axis(0)))?;
        Ok(ActionId(argmax(q.row(0))))
    }

    pub fn update_replay_memory(&mut self, transition: Transition) -> RebalancerResult<()> {
        self.memory.store(transition)
    }

    /// One learning step on a sampled minibatch. Returns the loss, or `None` while the memory
    /// holds fewer than `batch_size` transitions.
    pub fn replay(&mut self, batch_size: usize) -> RebalancerResult<Option<f64>> {
        if batch_size == 0 || self.memory.len() < batch_size {
            return Ok(None);
        }

        let batch = self.memory.sample(batch_size, &mut self.rng)?;
        let targets = self.td_targets(&batch)?;
        let loss = self.network.train_step(batch.states.view(), targets.view())?;

        self.epsilon = (self.epsilon * self.cfg.epsilon_decay).max(self.cfg.epsilon_min);

        tracing::debug!(loss, epsilon = self.epsilon, "Replay Step");
        Ok(Some(loss))
    }

    /// Training targets for `batch`: `Q(s)` with the taken action's column replaced by
    /// `r + (1 - done) * gamma * max_a' Q(s', a')`.
    pub fn td_targets(&self, batch: &Batch) -> RebalancerResult<Array2<f64>> {
        let mut targets = self.network.predict(batch.states.view())?;
        let q_next = self.network.predict(batch.next_states.view())?;
        let n_actions = self.n_actions();

        for (i, action) in batch.actions.iter().enumerate() {
            if action.0 >= n_actions {
                return Err(AgentError::InvalidInput(format!(
                    "action {} outside of {n_actions} Q-values",
                    action.0
                ))
                .into());
            }
            let max_next = q_next.row(i).fold(f64::NEG_INFINITY, |acc, &q| acc.max(q));
            targets[[i, action.0]] =
                batch.rewards[i] + (1.0 - batch.dones[i]) * self.cfg.gamma * max_next;
        }
        Ok(targets)
    }

    pub fn save(&self, path: &Path) -> RebalancerResult<()> {
        self.network.save(path)
    }

    pub fn load(&mut self, path: &Path) -> RebalancerResult<()> {
        self.network.load(path)
    }
}

impl Agent for DqnAgent {
    fn act(&mut self, obs: &Observation) -> RebalancerResult<ActionId> {
        DqnAgent::act(self, obs)
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Dqn
    }

    fn observe(&mut self, transition: Transition, batch_size: usize) -> RebalancerResult<()> {
        if !self.mode.is_train() {
            return Ok(());
        }
        self.update_replay_memory(transition)?;
        self.replay(batch_size)?;
        Ok(())
    }
}

/// Index of the first maximal value.
fn argmax(values: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
