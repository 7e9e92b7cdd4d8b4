use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    agent::dqn::DqnConfig,
    error::{DataError, EnvError, RebalancerResult},
    gym::rebalance::config::{DEFAULT_INITIAL_INVESTMENT, EnvConfig},
    io,
};

pub const DEFAULT_DATA_PATH: &str = "data.csv";
pub const DEFAULT_MODELS_DIR: &str = "rl_rebalancer_models";
pub const DEFAULT_REWARDS_DIR: &str = "rl_rebalancer_rewards";
pub const DEFAULT_EPISODES: usize = 2_000;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.5;

/// Everything a train or test run needs, loadable from JSON.
///
/// Missing fields fall back to their defaults, so a config file only has to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// CSV of valuations: header row, one column per unit, one row per time step.
    pub data_path: PathBuf,
    pub models_dir: PathBuf,
    pub rewards_dir: PathBuf,
    pub episodes: usize,
    pub batch_size: usize,
    pub initial_investment: f64,
    /// Share of leading rows used for training; the rest is held out for testing.
    pub train_fraction: f64,
    pub dqn: DqnConfig,
    /// Overrides `dqn.seed` when set.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            rewards_dir: PathBuf::from(DEFAULT_REWARDS_DIR),
            episodes: DEFAULT_EPISODES,
            batch_size: DEFAULT_BATCH_SIZE,
            initial_investment: DEFAULT_INITIAL_INVESTMENT,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            dqn: DqnConfig::default(),
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> RebalancerResult<Self> {
        let cfg: Self = io::load(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_data_path(self, data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            ..self
        }
    }

    pub fn with_models_dir(self, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            ..self
        }
    }

    pub fn with_rewards_dir(self, rewards_dir: impl Into<PathBuf>) -> Self {
        Self {
            rewards_dir: rewards_dir.into(),
            ..self
        }
    }

    pub fn with_episodes(self, episodes: usize) -> Self {
        Self { episodes, ..self }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn with_initial_investment(self, initial_investment: f64) -> Self {
        Self {
            initial_investment,
            ..self
        }
    }

    pub fn with_train_fraction(self, train_fraction: f64) -> Self {
        Self {
            train_fraction,
            ..self
        }
    }

    pub fn with_dqn(self, dqn: DqnConfig) -> Self {
        Self { dqn, ..self }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    pub fn env_config(&self) -> EnvConfig {
        EnvConfig::default().with_initial_investment(self.initial_investment)
    }

    /// Agent configuration with the run-level seed applied.
    pub fn agent_config(&self) -> DqnConfig {
        match self.seed {
            Some(seed) => self.dqn.with_seed(seed),
            None => self.dqn,
        }
    }

    pub fn validate(&self) -> RebalancerResult<()> {
        if self.episodes == 0 {
            return Err(EnvError::InvalidConfig("episodes must be positive".to_string()).into());
        }
        if self.batch_size == 0 {
            return Err(EnvError::InvalidConfig("batch_size must be positive".to_string()).into());
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(DataError::InvalidSplit(self.train_fraction).into());
        }
        self.env_config().validate()?;
        self.agent_config().validate()
    }
}
