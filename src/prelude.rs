// 1. Traits
pub use crate::agent::Agent;
pub use crate::gym::Env;

// 2. The Core "Loop" Types
pub use crate::agent::RunMode;
pub use crate::gym::rebalance::{
    action::{ActionId, Orders, TradeAction},
    action_space::ActionSpace,
    config::EnvConfig,
    env::{Environment, StepInfo},
    observation::Observation,
};
pub use crate::gym::{Reward, StepOutcome};
pub use crate::session::{run, run_episode, run_episodes};

// 3. Agents & Learning
pub use crate::agent::baseline::{HoldAgent, RandomAgent};
pub use crate::agent::dqn::{DqnAgent, DqnConfig};
pub use crate::agent::network::NetworkConfig;
pub use crate::agent::replay_buffer::{ReplayBuffer, Transition};
pub use crate::math::scaler::StandardScaler;

// 4. Data, Configuration & Artifacts
pub use crate::config::RunConfig;
pub use crate::data::valuations::Valuations;
pub use crate::io::ArtifactStore;
pub use crate::report::{PortfolioValues, Summary};

// 5. Errors
pub use crate::error::{
    AgentError, DataError, EnvError, IoError, RebalancerError, RebalancerResult, SystemError,
};
