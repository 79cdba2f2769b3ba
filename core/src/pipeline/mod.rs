// sluice/src/pipeline/mod.rs

//! Defines the `Pipeline<Err>` struct, its composition, and its two-pass
//! execution logic.

pub mod chain;
pub mod definition;
pub mod execution;

// Re-export the main Pipeline struct
pub use chain::Chained;
pub use definition::{Pipeline, PipelineBuilder};
