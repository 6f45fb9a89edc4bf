//! Cardinality / series index: measurement -> series map, tag-key/value
//! inverted index, sorted series-ID set algebra (spec.md §4.4).

pub mod error;
pub mod filter;
pub mod index;

pub use error::IndexError;
pub use filter::{Combinator, Filter};
pub use index::SeriesIndex;

#[cfg(test)]
mod tests;
