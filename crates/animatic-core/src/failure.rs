//! Structured attempt-failure taxonomy
//!
//! Every failure inside one attempt becomes an [`AttemptFailure`] that the
//! pipeline threads into the next generation request. Keeping the kind and
//! detail separate lets tests assert on the kind while the generation
//! boundary renders the detail into corrective prompt text.

use serde::{Deserialize, Serialize};

use crate::generator::GenerateError;
use crate::renderer::RenderError;
use crate::validator::ValidationError;

/// Classification of what went wrong during one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The generation service errored or timed out.
    Generation,
    /// The script did not parse.
    Syntax,
    /// The script lacks the required library import.
    MissingImport,
    /// The script lacks a class extending the scene base class.
    MissingSceneClass,
    /// The scene class lacks the required entry method.
    MissingEntryMethod,
    /// The renderer exited with a non-zero status.
    RenderFailed,
    /// The renderer exceeded its wall-clock ceiling.
    RenderTimeout,
    /// The renderer exited cleanly but no artifact was found.
    ArtifactNotFound,
}

impl FailureKind {
    /// Stable label used in observer events and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Syntax => "syntax",
            Self::MissingImport => "missing_import",
            Self::MissingSceneClass => "missing_scene_class",
            Self::MissingEntryMethod => "missing_entry_method",
            Self::RenderFailed => "render_failed",
            Self::RenderTimeout => "render_timeout",
            Self::ArtifactNotFound => "artifact_not_found",
        }
    }

    /// Whether the failure came from structural validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Syntax | Self::MissingImport | Self::MissingSceneClass | Self::MissingEntryMethod
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One attempt's failure: a classification plus a human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    /// What stage failed, and how.
    pub kind: FailureKind,
    /// Human-readable detail, precise enough to steer regeneration.
    pub detail: String,
}

impl AttemptFailure {
    /// Create a failure with an explicit kind.
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Create a generation-stage failure.
    pub fn generation(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Generation, detail)
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl From<GenerateError> for AttemptFailure {
    fn from(err: GenerateError) -> Self {
        Self::generation(err.to_string())
    }
}

impl From<ValidationError> for AttemptFailure {
    fn from(err: ValidationError) -> Self {
        let kind = match &err {
            ValidationError::EmptyScript | ValidationError::Syntax { .. } => FailureKind::Syntax,
            ValidationError::MissingImport { .. } => FailureKind::MissingImport,
            ValidationError::MissingSceneClass { .. } => FailureKind::MissingSceneClass,
            ValidationError::MissingEntryMethod { .. } => FailureKind::MissingEntryMethod,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<RenderError> for AttemptFailure {
    fn from(err: RenderError) -> Self {
        let kind = match &err {
            RenderError::Failed { .. } | RenderError::Io(_) => FailureKind::RenderFailed,
            RenderError::Timeout { .. } => FailureKind::RenderTimeout,
            RenderError::ArtifactNotFound { .. } => FailureKind::ArtifactNotFound,
        };
        Self::new(kind, err.to_string())
    }
}
