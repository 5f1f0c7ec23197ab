//! Error types for exomap

use thiserror::Error;

/// Result type alias for exomap operations
pub type Result<T> = std::result::Result<T, ExomapError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ExomapError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("{catalog} missing required columns: {columns:?}")]
    MissingColumns {
        catalog: String,
        columns: Vec<String>,
    },

    #[error("No shared features between KOI and TESS after mapping")]
    NoSharedFeatures,

    #[error("No rows left after harmonization ({0})")]
    EmptyDataset(String),

    #[error("Unsupported file format for {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },

    #[error("Projection error: {0}")]
    ProjectionError(String),

    #[error("Clustering error: {0}")]
    ClusteringError(String),

    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ExomapError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ExomapError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for ExomapError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExomapError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ExomapError {
    fn from(err: serde_json::Error) -> Self {
        ExomapError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ExomapError {
    fn from(err: ndarray::ShapeError) -> Self {
        ExomapError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
