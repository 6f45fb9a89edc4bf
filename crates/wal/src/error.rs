//! WAL error taxonomy.

use thiserror::Error;
use tsdb_core::error::{Classify, ErrorKind};

#[derive(Debug, Error, Clone)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("WAL is closed")]
    Closed,
    #[error("segment corrupt at offset {offset}: {detail}")]
    Corrupt { offset: u64, detail: String },
}

impl WalError {
    pub fn from_io(e: std::io::Error) -> Self {
        WalError::Io(e.to_string())
    }
}

impl From<std::io::Error> for WalError {
    fn from(e: std::io::Error) -> Self {
        WalError::from_io(e)
    }
}

impl Classify for WalError {
    fn kind(&self) -> ErrorKind {
        match self {
            WalError::Io(_) => ErrorKind::Durability,
            WalError::Closed => ErrorKind::Invalid,
            WalError::Corrupt { .. } => ErrorKind::Durability,
        }
    }
}
