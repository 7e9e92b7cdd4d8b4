pub mod baseline;
pub mod dqn;
pub mod network;
pub mod replay_buffer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

use crate::{
    agent::replay_buffer::Transition,
    error::RebalancerResult,
    gym::rebalance::{action::ActionId, observation::Observation},
};

// ============================================================================
//  Run Mode
// ============================================================================

/// Selected once per run. `Train` explores, stores transitions and learns;
/// `Test` acts with a fixed small epsilon and never writes to the replay memory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Train,
    #[strum(to_string = "test", serialize = "eval")]
    Test,
}

impl RunMode {
    pub fn is_train(&self) -> bool {
        matches!(self, Self::Train)
    }
}

// ============================================================================
//  Core Agent Definitions
// ============================================================================

/// Identifies which agent produced a run, for logs and report names.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    Default,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentIdentifier {
    /// A custom user-defined agent.
    #[strum(to_string = "{0}")]
    Named(Arc<String>),

    Dqn,

    HoldAll,

    #[default]
    Random,
}

pub trait Agent {
    /// Choose a joint action for the (scaled) observation.
    fn act(&mut self, obs: &Observation) -> RebalancerResult<ActionId>;

    /// Optional agent name for logging/debugging.
    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Named(Arc::new(
            "UnnamedAgent: override Agent::identifier()".to_string(),
        ))
    }

    /// Learning hook, called after every training step. Default is no-op.
    fn observe(&mut self, _transition: Transition, _batch_size: usize) -> RebalancerResult<()> {
        Ok(())
    }

    /// Reset internal state at the end of an episode. Default is no-op.
    fn reset(&mut self) {}
}

impl Agent for Box<dyn Agent> {
    fn act(&mut self, obs: &Observation) -> RebalancerResult<ActionId> {
        (**self).act(obs)
    }

    fn identifier(&self) -> AgentIdentifier {
        (**self).identifier()
    }

    fn observe(&mut self, transition: Transition, batch_size: usize) -> RebalancerResult<()> {
        (**self).observe(transition, batch_size)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
