use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis, s};
use polars::prelude::{DataFrame, DataType, LazyCsvReader, LazyFileListReader, PlPath};

use crate::error::{DataError, IoError, RebalancerResult};

/// Minimum number of time steps (rows) and units (columns) of a usable table.
pub const MIN_ROWS: usize = 2;
pub const MIN_UNITS: usize = 2;

/// Historical per-unit valuations: rows are time steps, columns are units.
///
/// Every value is finite, and the table has at least
/// [`MIN_ROWS`] rows and [`MIN_UNITS`] columns. These invariants are checked once
/// at construction so the environment can index rows without further checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuations {
    values: Array2<f64>,
    unit_names: Vec<String>,
}

impl Valuations {
    pub fn new(values: Array2<f64>) -> RebalancerResult<Self> {
        let unit_names = (0..values.ncols()).map(|i| format!("grid_{i}")).collect();
        Self::with_unit_names(values, unit_names)
    }

    pub fn with_unit_names(values: Array2<f64>, unit_names: Vec<String>) -> RebalancerResult<Self> {
        let (rows, cols) = values.dim();
        if rows < MIN_ROWS || cols < MIN_UNITS {
            return Err(DataError::TooSmall { rows, cols }.into());
        }

        if let Some(((row, col), &value)) = values
            .indexed_iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(DataError::InvalidValuation { row, col, value }.into());
        }

        Ok(Self { values, unit_names })
    }

    /// Build from row-major nested vectors, e.g. a literal table in tests.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> RebalancerResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);

        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(DataError::DataFrame("Rows have differing lengths".to_string()).into());
        }

        let flat = rows.into_iter().flatten().collect::<Vec<_>>();
        let values = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| DataError::DataFrame(e.to_string()))?;
        Self::new(values)
    }

    /// Load a CSV file with a header row and one numeric column per unit.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn from_csv(path: &Path) -> RebalancerResult<Self> {
        if !path.exists() {
            return Err(IoError::ReadFailed(format!(
                "Valuation file not found: {}",
                path.display()
            ))
            .into());
        }

        let uri = path.to_str().ok_or_else(|| {
            IoError::FileSystem(format!(
                "Path contains invalid UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let df = LazyCsvReader::new(PlPath::new(uri))
            .with_has_header(true)
            .finish()
            .map_err(|e| DataError::DataFrame(format!("Failed to scan CSV: {e}")))?
            .collect()
            .map_err(|e| DataError::DataFrame(format!("Failed to read CSV: {e}")))?;

        let valuations = Self::try_from(df)?;
        tracing::info!(
            rows = valuations.n_steps(),
            units = valuations.n_units(),
            "Loaded valuation table"
        );
        Ok(valuations)
    }

    /// Split along time: the first `⌊n * train_fraction⌋` rows train, the rest test.
    pub fn split(&self, train_fraction: f64) -> RebalancerResult<(Self, Self)> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(DataError::InvalidSplit(train_fraction).into());
        }

        let n_train = (self.n_steps() as f64 * train_fraction).floor() as usize;
        let train = self.values.slice(s![..n_train, ..]).to_owned();
        let test = self.values.slice(s![n_train.., ..]).to_owned();

        Ok((
            Self::with_unit_names(train, self.unit_names.clone())?,
            Self::with_unit_names(test, self.unit_names.clone())?,
        ))
    }

    /// Number of time steps in the series.
    pub fn n_steps(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_units(&self) -> usize {
        self.values.ncols()
    }

    pub fn unit_names(&self) -> &[String] {
        &self.unit_names
    }

    /// Valuation row at time step `step`.
    ///
    /// # Panics
    /// If `step >= n_steps()`. The environment never steps past its terminal row.
    pub fn row(&self, step: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(0), step)
    }
}

impl TryFrom<DataFrame> for Valuations {
    type Error = crate::error::RebalancerError;

    fn try_from(df: DataFrame) -> Result<Self, Self::Error> {
        let (rows, cols) = df.shape();
        let mut values = Array2::<f64>::zeros((rows, cols));
        let mut unit_names = Vec::with_capacity(cols);

        for (j, column) in df.get_columns().iter().enumerate() {
            let name = column.name().to_string();
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| DataError::DataFrame(format!("Column '{name}' is not numeric: {e}")))?;
            let ca = series
                .f64()
                .map_err(|e| DataError::DataFrame(e.to_string()))?;

            for (i, value) in ca.into_iter().enumerate() {
                values[[i, j]] = value.ok_or_else(|| DataError::MissingValuation {
                    row: i,
                    column: name.clone(),
                })?;
            }
            unit_names.push(name);
        }

        Self::with_unit_names(values, unit_names)
    }
}
