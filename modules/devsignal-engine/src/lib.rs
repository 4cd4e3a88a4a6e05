pub mod correlation;
pub mod merge;
pub mod pipeline;
pub mod scoring;

pub use merge::{merge, MergeInput, SourceOutcome};
pub use pipeline::{Pipeline, PipelineError, RunOptions, Sources};
pub use scoring::score;
