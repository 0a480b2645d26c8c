//! Query and aggregation over the loaded tables.
//!
//! Every function here is a pure transform of its inputs: no I/O, no
//! logging, no rendering.

pub mod aggregator;
pub mod ratio;
pub mod search;
pub mod stats;

pub use aggregator::*;
pub use ratio::*;
pub use search::*;
pub use stats::*;
