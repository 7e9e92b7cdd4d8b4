use serde::{Deserialize, Serialize};

use crate::{error::RebalancerResult, impl_add_sub_primitive, impl_from_primitive};

pub mod rebalance;

use rebalance::{
    action::ActionId,
    env::StepInfo,
    observation::Observation,
};

/// The change in portfolio value produced by a single environment step.
///
/// Valuations are continuous quantities read straight from the data source,
/// so the reward is kept as an `f64` rather than rounded to whole units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reward(pub f64);
impl_from_primitive!(Reward, f64);
impl_add_sub_primitive!(Reward, f64);

/// A Gym-like environment driven by discrete action indices.
pub trait Env {
    /// Restart the episode and return the initial observation.
    fn reset(&mut self) -> RebalancerResult<Observation>;

    /// Apply one action and advance time by one step.
    fn step(
        &mut self,
        action: ActionId,
    ) -> RebalancerResult<(Observation, Reward, StepOutcome, StepInfo)>;
}

/// Represents the lifecycle status of the environment.
///
/// # Lifecycle
///
/// ```md
/// Current State                 | Action  | Next State | Notes
/// ------------------------------|---------|------------|-----------------------------------
/// `Running` (last row reached)  | step()  | Done       | Episode terminates
/// `Running`                     | step()  | Running    | Continue within episode
/// `Ready` / `Running` / `Done`  | reset() | Running    | Restart at the first row
/// ```
///
/// Calling `step()` in `Ready` or `Done` is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvStatus {
    /// Initial state. The environment is waiting for `reset()` to be called.
    Ready,

    /// An episode is active and the environment accepts `step()` calls.
    Running,

    /// The episode has consumed the whole valuation series.
    Done,
}

impl EnvStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    InProgress,
    /// end of the valuation series
    Done,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
