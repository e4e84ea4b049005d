//! The progress-reporting capability handed to a running pipeline.

use async_trait::async_trait;

use crate::error::CoreError;

/// Capability through which a running pipeline reports its advancement.
///
/// Bound to exactly one job for the duration of one execution. The
/// pipeline depends only on this trait and never sees where the updates
/// go. Implementations apply last-write-wins semantics on step/progress:
/// a pipeline that reports a lower percentage after a higher one (e.g.
/// during an internal retry) is not rejected.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Record the current step and completion percentage, optionally
    /// appending `message` to the job's log.
    ///
    /// `progress` is clamped to `0..=100` by the implementation. Calls
    /// are expected to originate from a single execution unit; the
    /// update must be atomic with respect to concurrent readers.
    async fn report(
        &self,
        step: &str,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), CoreError>;
}
