//! Pipeline data types
//!
//! Values that flow between the generator, validator, and renderer within a
//! single attempt, plus the final result surfaced to the caller.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::failure::AttemptFailure;

/// One generation request, built fresh by the pipeline for each attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user's original prompt, trimmed.
    pub prompt: String,
    /// Failure recorded by the previous attempt, absent on the first.
    pub feedback: Option<AttemptFailure>,
    /// 1-based attempt number, for diagnostics.
    pub attempt: u32,
}

impl GenerationRequest {
    /// Create the first request for a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            feedback: None,
            attempt: 1,
        }
    }

    /// Attach feedback from a failed prior attempt.
    pub fn with_feedback(mut self, feedback: AttemptFailure) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Set the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// A candidate scene script produced by the generator.
///
/// The source has already had any enclosing code-fence markers stripped.
/// A candidate lives for exactly one attempt: it is discarded on validation
/// failure and forwarded to the renderer on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateScript {
    /// Cleaned script source text.
    pub source: String,
}

impl CandidateScript {
    /// Wrap cleaned script source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A rendered video artifact located on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    /// Filesystem path of the located video file.
    pub path: PathBuf,
}

impl RenderedArtifact {
    /// Wrap a located artifact path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The artifact's bare file name, used to build retrieval references.
    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.path).file_name().and_then(|n| n.to_str())
    }
}

/// Successful pipeline result: one validated script, one rendered artifact.
#[derive(Debug, Clone)]
pub struct RenderedAnimation {
    /// The script that rendered successfully.
    pub script: String,
    /// Scene identifier the renderer was invoked with.
    pub scene_name: String,
    /// The located video artifact.
    pub artifact: RenderedArtifact,
    /// Number of attempts consumed, including the successful one.
    pub attempts_used: u32,
    /// Completion timestamp.
    pub rendered_at: DateTime<Utc>,
}
