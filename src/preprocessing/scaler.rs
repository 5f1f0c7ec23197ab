//! Feature scaling implementations

use crate::error::{ExomapError, Result};
use crate::utils::SimdOps;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    #[default]
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// No scaling
    None,
}

impl fmt::Display for ScalerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalerType::Standard => "standard",
            ScalerType::MinMax => "minmax",
            ScalerType::Robust => "robust",
            ScalerType::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for ScalerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            "none" => Ok(ScalerType::None),
            other => Err(format!("unknown scaler '{other}'")),
        }
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Column-wise feature scaler over row-major matrices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<&mut Self> {
        let n_cols = rows.first().map(Vec::len).ok_or(ExomapError::InsufficientData {
            required: 1,
            actual: 0,
        })?;
        check_width(rows, n_cols)?;

        self.params = (0..n_cols)
            .map(|j| self.compute_params(&SimdOps::column(rows, j)))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(ExomapError::ModelNotFitted);
        }
        check_width(rows, self.params.len())?;

        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.params)
                    .map(|(v, p)| (v - p.center) / p.scale)
                    .collect()
            })
            .collect())
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit(rows)?;
        self.transform(rows)
    }

    fn compute_params(&self, col: &[f64]) -> ScalerParams {
        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                // population std, ddof = 0
                (SimdOps::mean_f64(col), SimdOps::variance_f64(col).sqrt())
            }
            ScalerType::MinMax => {
                let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            ScalerType::Robust => {
                let mut sorted = col.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let median = quantile(&sorted, 0.5);
                (median, quantile(&sorted, 0.75) - quantile(&sorted, 0.25))
            }
            ScalerType::None => (0.0, 1.0),
        };

        ScalerParams {
            center,
            scale: if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale },
        }
    }
}

fn check_width(rows: &[Vec<f64>], expected: usize) -> Result<()> {
    match rows.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ExomapError::ShapeError {
            expected: format!("{expected} columns"),
            actual: format!("{} columns", row.len()),
        }),
        None => Ok(()),
    }
}

/// Linear-interpolated quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
