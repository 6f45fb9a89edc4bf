//! Cache error taxonomy.

use thiserror::Error;
use tsdb_core::error::{Classify, ErrorKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache memory exceeded: requested {requested} bytes, {available} available")]
    MemoryExceeded { requested: u64, available: u64 },
}

impl Classify for CacheError {
    fn kind(&self) -> ErrorKind {
        match self {
            CacheError::MemoryExceeded { .. } => ErrorKind::Capacity,
        }
    }
}
