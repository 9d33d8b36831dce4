//! Script generator abstraction
//!
//! The generator turns a prompt (plus optional corrective feedback) into a
//! candidate scene script. Implementations talk to a generative text service;
//! the pipeline only sees this trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CandidateScript, GenerationRequest};

/// Generation errors surfaced to the pipeline.
///
/// All variants are retryable: the pipeline records them as feedback and
/// regenerates. No local retry is performed by implementations.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The text service failed: transport error, timeout, or a non-success
    /// response (the detail carries the response body).
    #[error("generation service error: {0}")]
    Service(String),

    /// The service responded but the completion was unusable.
    #[error("invalid completion: {0}")]
    InvalidCompletion(String),
}

/// Script generator trait
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Produce a cleaned candidate script for the request.
    ///
    /// When `request.feedback` is present the implementation must reframe the
    /// user message as a correction of the previous failure rather than
    /// resending the original prompt verbatim.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<CandidateScript, GenerateError>;
}

#[async_trait]
impl ScriptGenerator for std::sync::Arc<dyn ScriptGenerator> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<CandidateScript, GenerateError> {
        (**self).generate(request).await
    }
}
