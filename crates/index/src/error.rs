//! Series-index error taxonomy.

use thiserror::Error;
use tsdb_core::error::{Classify, ErrorKind};
use tsdb_core::FieldError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("measurement {0:?} not found")]
    MeasurementNotFound(String),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),
}

impl Classify for IndexError {
    fn kind(&self) -> ErrorKind {
        match self {
            IndexError::MeasurementNotFound(_) => ErrorKind::NotFound,
            IndexError::Field(e) => e.kind(),
            IndexError::InvalidPattern(_) => ErrorKind::Invalid,
        }
    }
}
