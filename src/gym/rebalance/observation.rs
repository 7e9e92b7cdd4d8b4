use ndarray::{Array1, ArrayView1, s};
use serde::{Deserialize, Serialize};

/// Flat feature vector fed to the agent: `[units_owned (G), valuations (G), cash (1)]`.
///
/// The same type carries both raw and standardized observations; the
/// [`crate::math::scaler::StandardScaler`] maps one to the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation(pub Array1<f64>);

impl Observation {
    /// Dimension of an observation for `n_units` units.
    pub fn dim_for(n_units: usize) -> usize {
        2 * n_units + 1
    }

    pub fn from_parts(units_owned: ArrayView1<f64>, valuations: ArrayView1<f64>, cash: f64) -> Self {
        let n = units_owned.len();
        let mut obs = Array1::zeros(Self::dim_for(n));
        obs.slice_mut(s![..n]).assign(&units_owned);
        obs.slice_mut(s![n..2 * n]).assign(&valuations);
        obs[2 * n] = cash;
        Self(obs)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }
}

impl From<Array1<f64>> for Observation {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}
