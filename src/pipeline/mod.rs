//! Capture pipeline — normalization, parsing, enrichment, synthesis,
//! persistence.

pub mod capture;
pub mod merge;
pub mod normalize;
pub mod types;

pub use capture::CapturePipeline;
pub use types::*;
