//! Error taxonomy shared by every layer of the write-ingest core.
//!
//! Each crate defines its own `Error` enum for the failures specific to that
//! layer, but all of them classify into the same high-level buckets from the
//! error-handling design: `NotFound`, `Invalid`, `Conflict`, `Transient`,
//! `Durability`, `Capacity`, `Partial`. [`ErrorKind`] is that classification;
//! [`Classify`] lets callers branch on it without matching every variant of
//! every crate's concrete error type.

use std::fmt;

/// High-level error category, independent of which crate raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Database, retention policy, shard, series, or tag key does not exist.
    NotFound,
    /// Malformed input: bad tag, field-type conflict, field overflow, etc.
    Invalid,
    /// Name/label uniqueness violation.
    Conflict,
    /// Timeout or other condition a retry may resolve.
    Transient,
    /// A durability-layer write failed; the batch is not retried by the core.
    Durability,
    /// A resource bound (memory, segment size) was hit.
    Capacity,
    /// Some but not all of a batch was applied.
    Partial,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Durability => "durability",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Partial => "partial",
        };
        f.write_str(s)
    }
}

/// Implemented by every crate's error type so callers can branch on category
/// without depending on every crate's concrete variants.
pub trait Classify {
    /// The high-level bucket this error falls into.
    fn kind(&self) -> ErrorKind;

    /// Whether a caller may usefully retry the operation that produced this
    /// error. Mirrors the propagation policy in the error-handling design:
    /// `Transient` is retryable, everything else is not.
    fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}
