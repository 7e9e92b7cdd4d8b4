use serde::{Deserialize, Serialize};

use crate::error::{EnvError, RebalancerResult};

/// Starting cash of every episode in the reference setup.
pub const DEFAULT_INITIAL_INVESTMENT: f64 = 20_000.0;

/// Configuration blueprint for a rebalancing [`super::env::Environment`].
///
/// # Example
///
/// ```
/// # use rebalancer::prelude::*;
/// let cfg = EnvConfig::default().with_initial_investment(1_000.0);
/// assert_eq!(cfg.initial_investment(), 1_000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Cash available at `reset()`.
    initial_investment: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_investment: DEFAULT_INITIAL_INVESTMENT,
        }
    }
}

impl EnvConfig {
    pub fn with_initial_investment(self, initial_investment: f64) -> Self {
        Self { initial_investment }
    }

    pub fn initial_investment(&self) -> f64 {
        self.initial_investment
    }

    pub fn validate(&self) -> RebalancerResult<()> {
        if !self.initial_investment.is_finite() || self.initial_investment < 0.0 {
            return Err(EnvError::InvalidConfig(format!(
                "Initial investment must be a finite non-negative amount, got {}",
                self.initial_investment
            ))
            .into());
        }
        Ok(())
    }
}
