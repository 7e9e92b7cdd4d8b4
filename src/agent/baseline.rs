//! Reference agents that never learn, for sanity-checking the DQN agent.

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    agent::{Agent, AgentIdentifier},
    error::RebalancerResult,
    gym::rebalance::{action::ActionId, action_space::ActionSpace, observation::Observation},
};

/// Always plays the joint hold action; the portfolio only moves with valuations.
#[derive(Debug, Clone)]
pub struct HoldAgent {
    hold: ActionId,
}

impl HoldAgent {
    pub fn new(action_space: &ActionSpace) -> Self {
        Self {
            hold: action_space.hold_all(),
        }
    }
}

impl Agent for HoldAgent {
    fn act(&mut self, _obs: &Observation) -> RebalancerResult<ActionId> {
        Ok(self.hold)
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::HoldAll
    }
}

/// Samples every action uniformly from the action space.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    action_space: ActionSpace,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(action_space: ActionSpace, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { action_space, rng }
    }
}

impl Agent for RandomAgent {
    fn act(&mut self, _obs: &Observation) -> RebalancerResult<ActionId> {
        Ok(self.action_space.sample(&mut self.rng))
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Random
    }
}
