//! Bridge orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{BusMode, Pipeline, PipelineConfig};
pub use stats::PipelineStats;
