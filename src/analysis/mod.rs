//! Analysis modules.
//!
//! Grouped summaries over the unified sales table.

pub mod aggregator;

pub use aggregator::*;
