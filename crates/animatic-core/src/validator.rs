//! Structural validation abstraction
//!
//! Validation is syntax + shape checking of a candidate script: it gates what
//! is allowed to reach the renderer, and its error variants are specific
//! enough to steer the next generation attempt. Semantic correctness of the
//! animation is out of scope.

use thiserror::Error;

/// Structural validation errors.
///
/// Each violated requirement has its own variant so three scripts differing
/// only in which requirement they break produce three distinct reasons.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The script is empty or whitespace-only; nothing was parsed.
    #[error("script is empty")]
    EmptyScript,

    /// The script did not parse.
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based line of the first offending node.
        line: usize,
        message: String,
    },

    /// No import of the required animation library.
    #[error("missing required import of '{module}'")]
    MissingImport { module: String },

    /// No class extending the scene base class.
    #[error("no class extending '{base}' found")]
    MissingSceneClass { base: String },

    /// The scene class lacks the required entry method.
    #[error("class '{class}' has no '{method}' method")]
    MissingEntryMethod { class: String, method: String },
}

/// Script validator trait
///
/// Implementations must be pure with respect to the input text; side effects
/// are limited to diagnostic tracing.
pub trait ScriptValidator: Send + Sync {
    /// Check the script against the structural contract.
    ///
    /// Checks run in a fixed order and the first unmet requirement is
    /// reported; a script that passes renders without further gating.
    fn validate(&self, source: &str) -> Result<(), ValidationError>;

    /// Declared name of the first class extending the scene base class.
    ///
    /// Returns `None` when the source does not parse or no matching class
    /// exists; callers supply their own fallback identifier.
    fn extract_scene_name(&self, source: &str) -> Option<String>;
}

impl ScriptValidator for std::sync::Arc<dyn ScriptValidator> {
    fn validate(&self, source: &str) -> Result<(), ValidationError> {
        (**self).validate(source)
    }

    fn extract_scene_name(&self, source: &str) -> Option<String> {
        (**self).extract_scene_name(source)
    }
}
