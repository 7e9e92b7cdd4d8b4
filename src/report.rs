use std::{
    fmt,
    fs::{self, File},
    path::{Path, PathBuf},
};

use ordered_float::OrderedFloat;
use polars::{
    df,
    prelude::{CsvWriter, DataFrame, SerWriter},
};
use serde::{Deserialize, Serialize};

use crate::{
    agent::RunMode,
    error::{DataError, IoError, RebalancerResult},
};

/// Final portfolio value of every episode in a run, in episode order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValues {
    mode: RunMode,
    values: Vec<f64>,
}

impl PortfolioValues {
    pub const EPISODE_COL: &'static str = "episode";
    pub const VALUE_COL: &'static str = "portfolio_value";

    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            values: Vec::new(),
        }
    }

    pub fn with_capacity(mode: RunMode, capacity: usize) -> Self {
        Self {
            mode,
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `train.csv` or `test.csv`.
    pub fn filename(&self) -> String {
        format!("{}.csv", self.mode)
    }

    pub fn to_df(&self) -> RebalancerResult<DataFrame> {
        let episodes = (0..self.values.len() as u64).collect::<Vec<_>>();
        df!(
            Self::EPISODE_COL => episodes,
            Self::VALUE_COL => self.values.clone(),
        )
        .map_err(|e| DataError::DataFrame(format!("Failed to build report frame: {e}")).into())
    }

    /// Write the report into `dir`, creating it if needed. Returns the file path.
    pub fn to_csv(&self, dir: impl AsRef<Path>) -> RebalancerResult<PathBuf> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                IoError::FileSystem(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let file_path = dir.join(self.filename());
        let mut file = File::create(&file_path).map_err(IoError::from)?;
        let mut df = self.to_df()?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| {
                IoError::WriteFailed(format!(
                    "Failed to write CSV to '{}': {e}",
                    file_path.display()
                ))
            })?;

        Ok(file_path)
    }

    pub fn summary(&self) -> Option<Summary> {
        if self.values.is_empty() {
            return None;
        }

        let mut sorted = self
            .values
            .iter()
            .copied()
            .map(OrderedFloat)
            .collect::<Vec<_>>();
        sorted.sort_unstable();

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2].0
        } else {
            (sorted[n / 2 - 1].0 + sorted[n / 2].0) / 2.0
        };

        Some(Summary {
            episodes: n,
            mean: self.values.iter().sum::<f64>() / n as f64,
            median,
            min: sorted[0].0,
            max: sorted[n - 1].0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub episodes: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "episodes: {}, mean: {:.2}, median: {:.2}, min: {:.2}, max: {:.2}",
            self.episodes, self.mean, self.median, self.min, self.max
        )
    }
}
