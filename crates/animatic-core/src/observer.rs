//! Pipeline observability seam
//!
//! The pipeline narrates its progress through this interface in addition to
//! its own tracing calls, so hosts can surface attempt-by-attempt progress
//! without scraping logs. Observer failures are logged and never fail a run.

use async_trait::async_trait;

use crate::failure::AttemptFailure;

/// One progress event emitted by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    /// Per-run identifier, shared by all events of one `run` call.
    pub run_id: String,
    /// 1-based attempt number, 0 for run-level events.
    pub attempt: u32,
    /// Phase label, e.g. attempt_started/validation_failed/pipeline_succeeded.
    pub phase: String,
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Structured failure attached to *_failed events.
    pub failure: Option<AttemptFailure>,
}

impl PipelineEvent {
    pub fn new(run_id: impl Into<String>, attempt: u32, phase: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            attempt,
            phase: phase.into(),
            message: None,
            failure: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_failure(mut self, failure: AttemptFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}

/// Sink interface for pipeline progress reporting.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn observe(&self, event: PipelineEvent) -> Result<(), String>;
}
