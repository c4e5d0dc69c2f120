//! Instrumented, retried stage execution

mod error;
mod instrument;
mod pipeline;
mod resilient;

pub use error::PipelineError;
pub use instrument::{Instrumentation, Stage};
pub use pipeline::{StagePipeline, StageReport};
pub use resilient::ResilientIo;
