use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the encoding contract.
#[derive(Debug, Error, PartialEq)]
pub enum EncodingError {
    #[error("unknown categorical field '{0}' (expected Airline, Origin or Destination)")]
    UnknownField(String),
    #[error("invalid departure timestamp '{0}'")]
    BadTimestamp(String),
    #[error("duplicate category '{0}' in encoder vocabulary")]
    DuplicateCategory(String),
    #[error("encoder table is missing the {0} encoder")]
    MissingEncoder(String),
}

/// Scoring failures inside the classifier.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("classifier has no trees")]
    Empty,
    #[error("feature {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },
    #[error("tree {0} is malformed")]
    Corrupt(usize),
}

/// What the inference pipeline hands back to callers.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Internal(String),
}

impl From<EncodingError> for PredictError {
    fn from(e: EncodingError) -> Self {
        PredictError::InvalidInput(e.to_string())
    }
}

impl From<ModelError> for PredictError {
    fn from(e: ModelError) -> Self {
        PredictError::Internal(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("could not find training data (searched {searched:?})")]
    DataSourceMissing { searched: Vec<PathBuf> },
    #[error("training data at {} has no usable rows", .0.display())]
    EmptyDataset(PathBuf),
    #[error("need at least 2 rows to split into train and evaluation sets, got {0}")]
    TooFewRows(usize),
    #[error("failed to read training data: {0}")]
    Csv(#[from] csv::Error),
    #[error("evaluation scoring failed: {0}")]
    Model(#[from] ModelError),
}
