use ndarray::{Array1, ArrayView1, Axis, stack};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AgentError, RebalancerResult},
    gym::{
        Env,
        rebalance::{env::Environment, observation::Observation},
    },
};

/// Per-dimension standardization `(x - mean) / scale`.
///
/// `scale` is the population standard deviation of the fitted samples. Dimensions with zero
/// spread get a scale of `1.0`, so they are centred but not blown up.
///
/// Fitted once and then frozen: the same parameters must be used for every episode and for
/// both training and evaluation, otherwise the Q-network sees a shifted input distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(samples: &[Observation]) -> RebalancerResult<Self> {
        let Some(first) = samples.first() else {
            return Err(AgentError::InvalidInput(
                "Cannot fit a scaler on zero samples".to_string(),
            )
            .into());
        };

        let dim = first.dim();
        if let Some(bad) = samples.iter().find(|s| s.dim() != dim) {
            return Err(AgentError::ShapeMismatch {
                context: "scaler fit",
                expected: dim,
                actual: bad.dim(),
            }
            .into());
        }

        let views = samples.iter().map(Observation::view).collect::<Vec<_>>();
        let matrix = stack(Axis(0), &views).map_err(|e| AgentError::InvalidInput(e.to_string()))?;

        let mean = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| AgentError::InvalidInput("Empty sample matrix".to_string()))?;
        let scale = matrix
            .var_axis(Axis(0), 0.0)
            .mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });

        Ok(Self { mean, scale })
    }

    /// Fit on observations from one episode of uniformly random play.
    ///
    /// Uses a fresh copy of `env`, so the caller's environment is left untouched.
    /// Sampling stops as soon as the episode signals done.
    pub fn fit_from_random_play<R: Rng>(env: &Environment, rng: &mut R) -> RebalancerResult<Self> {
        let mut env = env.fresh();
        env.reset()?;

        let mut samples = Vec::with_capacity(env.n_steps());
        for _ in 0..env.n_steps() {
            let action = env.action_space().sample(rng);
            let (obs, _, outcome, _) = env.step(action)?;
            samples.push(obs);
            if outcome.is_done() {
                break;
            }
        }

        tracing::debug!(samples = samples.len(), "Fitting scaler on random play");
        Self::fit(&samples)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    pub fn transform(&self, obs: &Observation) -> RebalancerResult<Observation> {
        if obs.dim() != self.dim() {
            return Err(AgentError::ShapeMismatch {
                context: "scaler transform",
                expected: self.dim(),
                actual: obs.dim(),
            }
            .into());
        }
        Ok(Observation((&obs.0 - &self.mean) / &self.scale))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{data::valuations::Valuations, gym::rebalance::config::EnvConfig};

    fn obs(values: Array1<f64>) -> Observation {
        Observation(values)
    }

    #[test]
    fn test_fit_computes_population_mean_and_std() {
        let samples = vec![obs(array![1.0, 10.0]), obs(array![3.0, 30.0])];

        let scaler = StandardScaler::fit(&samples).unwrap();

        assert_eq!(scaler.mean(), array![2.0, 20.0]);
        assert_eq!(scaler.scale(), array![1.0, 10.0]);
    }

    #[test]
    fn test_transform_standardizes() {
        let samples = vec![obs(array![1.0, 10.0]), obs(array![3.0, 30.0])];
        let scaler = StandardScaler::fit(&samples).unwrap();

        let z = scaler.transform(&obs(array![3.0, 0.0])).unwrap();

        assert_eq!(z.0, array![1.0, -2.0]);
    }

    #[test]
    fn test_constant_dimension_is_centred_not_divided_by_zero() {
        let samples = vec![obs(array![5.0, 1.0]), obs(array![5.0, 3.0])];
        let scaler = StandardScaler::fit(&samples).unwrap();

        let z = scaler.transform(&obs(array![7.0, 2.0])).unwrap();

        assert_eq!(scaler.scale()[0], 1.0);
        assert_eq!(z.0, array![2.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_empty_and_ragged_samples() {
        assert!(StandardScaler::fit(&[]).is_err());
        assert!(StandardScaler::fit(&[obs(array![1.0]), obs(array![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_transform_rejects_wrong_dimension() {
        let scaler = StandardScaler::fit(&[obs(array![1.0, 2.0])]).unwrap();
        assert!(scaler.transform(&obs(array![1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_fit_from_random_play_covers_one_episode() {
        let valuations = Valuations::from_rows(vec![
            vec![10.0, 20.0],
            vec![11.0, 19.0],
            vec![12.0, 18.0],
            vec![13.0, 17.0],
            vec![14.0, 16.0],
        ])
        .unwrap();
        let env = Environment::new(Arc::new(valuations), EnvConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let scaler = StandardScaler::fit_from_random_play(&env, &mut rng).unwrap();

        assert_eq!(scaler.dim(), env.observation_dim());
        // Valuation columns see rows 1..=4 regardless of the actions taken.
        assert!((scaler.mean()[2] - 12.5).abs() < 1e-12);
        assert!((scaler.mean()[3] - 17.5).abs() < 1e-12);
        // The caller's environment is untouched.
        assert!(env.status().is_ready());
    }
}
