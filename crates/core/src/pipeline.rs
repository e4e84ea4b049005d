//! The content-generation pipeline boundary.

use async_trait::async_trait;

use crate::generation::{GenerationConfig, GenerationOutput};
use crate::progress::ProgressSink;

/// Error raised by a pipeline run.
///
/// The orchestration side never inspects these beyond their message: any
/// variant becomes the job's terminal `failed` state.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Fetching or reading the content source failed.
    #[error("Source error: {0}")]
    Source(String),

    /// Producing tutorial content from the fetched source failed.
    #[error("Generation error: {0}")]
    Generation(String),
}

/// A long-running content-generation task.
///
/// Opaque to the orchestration subsystem: it receives the job
/// configuration and a [`ProgressSink`], runs to completion, and either
/// returns a [`GenerationOutput`] or fails. It has no access to job
/// records or storage.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn run(
        &self,
        config: &GenerationConfig,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationOutput, PipelineError>;
}
