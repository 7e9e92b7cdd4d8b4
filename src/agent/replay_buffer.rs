use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AgentError, RebalancerResult},
    gym::{
        Reward,
        rebalance::{action::ActionId, observation::Observation},
    },
};

/// One step of experience `(s, a, r, s', done)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Observation,
    pub action: ActionId,
    pub reward: Reward,
    pub next_state: Observation,
    pub done: bool,
}

/// A minibatch gathered from the replay memory as parallel arrays.
///
/// Row `i` of `states`/`next_states` belongs to `actions[i]`, `rewards[i]` and `dones[i]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub states: Array2<f64>,
    pub next_states: Array2<f64>,
    pub actions: Vec<ActionId>,
    pub rewards: Array1<f64>,
    /// `1.0` for terminal transitions, `0.0` otherwise.
    pub dones: Array1<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Fixed-capacity circular experience memory.
///
/// Transitions are stored column-wise in preallocated arrays, so `store` is O(1) and
/// never reallocates. Once full, each `store` overwrites the oldest transition.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    states: Array2<f64>,
    next_states: Array2<f64>,
    actions: Vec<ActionId>,
    rewards: Array1<f64>,
    dones: Array1<f64>,
    /// Slot the next `store` writes to.
    ptr: usize,
    size: usize,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(obs_dim: usize, capacity: usize) -> RebalancerResult<Self> {
        if capacity == 0 {
            return Err(AgentError::InvalidConfig(
                "Replay buffer capacity must be positive".to_string(),
            )
            .into());
        }

        Ok(Self {
            states: Array2::zeros((capacity, obs_dim)),
            next_states: Array2::zeros((capacity, obs_dim)),
            actions: vec![ActionId(0); capacity],
            rewards: Array1::zeros(capacity),
            dones: Array1::zeros(capacity),
            ptr: 0,
            size: 0,
            capacity,
        })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn obs_dim(&self) -> usize {
        self.states.ncols()
    }

    pub fn store(&mut self, transition: Transition) -> RebalancerResult<()> {
        let dim = self.obs_dim();
        for obs in [&transition.state, &transition.next_state] {
            if obs.dim() != dim {
                return Err(AgentError::ShapeMismatch {
                    context: "replay buffer store",
                    expected: dim,
                    actual: obs.dim(),
                }
                .into());
            }
        }

        self.states.row_mut(self.ptr).assign(&transition.state.0);
        self.next_states.row_mut(self.ptr).assign(&transition.next_state.0);
        self.actions[self.ptr] = transition.action;
        self.rewards[self.ptr] = transition.reward.0;
        self.dones[self.ptr] = if transition.done { 1.0 } else { 0.0 };

        self.ptr = (self.ptr + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
        Ok(())
    }

    /// Draw `batch_size` transitions uniformly, with replacement, from the filled slots.
    pub fn sample<R: Rng>(&self, batch_size: usize, rng: &mut R) -> RebalancerResult<Batch> {
        if self.is_empty() {
            return Err(AgentError::EmptyReplayMemory.into());
        }

        let idxs = (0..batch_size)
            .map(|_| rng.random_range(0..self.size))
            .collect::<Vec<_>>();

        Ok(Batch {
            states: self.states.select(Axis(0), &idxs),
            next_states: self.next_states.select(Axis(0), &idxs),
            actions: idxs.iter().map(|&i| self.actions[i]).collect(),
            rewards: self.rewards.select(Axis(0), &idxs),
            dones: self.dones.select(Axis(0), &idxs),
        })
    }

    /// The `i`-th surviving transition in insertion order; `get(0)` is the oldest.
    pub fn get(&self, i: usize) -> Option<Transition> {
        if i >= self.size {
            return None;
        }

        let oldest = if self.size < self.capacity { 0 } else { self.ptr };
        let slot = (oldest + i) % self.capacity;

        Some(Transition {
            state: Observation(self.states.row(slot).to_owned()),
            action: self.actions[slot],
            reward: Reward(self.rewards[slot]),
            next_state: Observation(self.next_states.row(slot).to_owned()),
            done: self.dones[slot] > 0.5,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    /// Transition tagged by `k` in every field so its origin is recognizable.
    fn transition(k: usize) -> Transition {
        let x = k as f64;
        Transition {
            state: Observation(array![x, x]),
            action: ActionId(k),
            reward: Reward(x),
            next_state: Observation(array![x + 0.5, x + 0.5]),
            done: k % 2 == 0,
        }
    }

    #[test]
    fn test_store_grows_until_capacity() {
        let mut buffer = ReplayBuffer::new(2, 3).unwrap();
        assert!(buffer.is_empty());

        buffer.store(transition(0)).unwrap();
        buffer.store(transition(1)).unwrap();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(0), Some(transition(0)));
        assert_eq!(buffer.get(1), Some(transition(1)));
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn test_wraparound_evicts_oldest_first() {
        // Arrange
        let capacity = 5;
        let k = 3;
        let mut buffer = ReplayBuffer::new(2, capacity).unwrap();

        // Act
        for i in 0..capacity + k {
            buffer.store(transition(i)).unwrap();
        }

        // Assert
        assert_eq!(buffer.len(), capacity);
        assert_eq!(buffer.get(0), Some(transition(k)), "Oldest survivor is index k");
        for i in 0..capacity {
            assert_eq!(buffer.get(i), Some(transition(k + i)));
        }
    }

    #[test]
    fn test_sample_from_empty_buffer_fails() {
        let buffer = ReplayBuffer::new(2, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(buffer.sample(4, &mut rng).is_err());
    }

    #[test]
    fn test_sample_with_replacement_from_single_transition() {
        let mut buffer = ReplayBuffer::new(2, 10).unwrap();
        buffer.store(transition(4)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let batch = buffer.sample(8, &mut rng).unwrap();

        assert_eq!(batch.len(), 8);
        assert!(batch.actions.iter().all(|a| *a == ActionId(4)));
        assert!(batch.rewards.iter().all(|r| *r == 4.0));
        assert!(batch.dones.iter().all(|d| *d == 1.0));
        assert_eq!(batch.states.dim(), (8, 2));
    }

    #[test]
    fn test_sample_rows_stay_aligned() {
        let mut buffer = ReplayBuffer::new(2, 16).unwrap();
        for i in 0..16 {
            buffer.store(transition(i)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(11);

        let batch = buffer.sample(32, &mut rng).unwrap();

        for (row, action) in batch.actions.iter().enumerate() {
            let x = action.0 as f64;
            assert_eq!(batch.states[[row, 0]], x);
            assert_eq!(batch.next_states[[row, 1]], x + 0.5);
            assert_eq!(batch.rewards[row], x);
            assert_eq!(batch.dones[row], if action.0 % 2 == 0 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_store_rejects_wrong_dimension() {
        let mut buffer = ReplayBuffer::new(3, 4).unwrap();
        assert!(buffer.store(transition(0)).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(ReplayBuffer::new(2, 0).is_err());
    }
}
