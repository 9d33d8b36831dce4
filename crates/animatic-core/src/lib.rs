//! # Animatic Core
//!
//! Core abstractions and deterministic logic for the Animatic pipeline.
//!
//! This crate contains:
//! - Request / script / artifact type definitions
//! - Generator / Validator / Renderer component traits
//! - The structured failure taxonomy threaded between attempts
//! - The bounded retry pipeline and its observer seam
//!
//! This crate does NOT care about:
//! - Which model produces scripts, or over what protocol
//! - How scripts are parsed
//! - How the rendering engine is invoked
//! - How results are transported back to the user

pub mod failure;
pub mod generator;
pub mod observer;
pub mod pipeline;
pub mod renderer;
pub mod types;
pub mod validator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::failure::{AttemptFailure, FailureKind};
    pub use crate::generator::{GenerateError, ScriptGenerator};
    pub use crate::observer::{PipelineEvent, PipelineObserver};
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineError};
    pub use crate::renderer::{RenderError, SceneRenderer};
    pub use crate::types::{
        CandidateScript, GenerationRequest, RenderedAnimation, RenderedArtifact,
    };
    pub use crate::validator::{ScriptValidator, ValidationError};
}

// Re-export key types at crate root
pub use failure::{AttemptFailure, FailureKind};
pub use generator::{GenerateError, ScriptGenerator};
pub use observer::{PipelineEvent, PipelineObserver};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
pub use renderer::{RenderError, SceneRenderer};
pub use types::{CandidateScript, GenerationRequest, RenderedAnimation, RenderedArtifact};
pub use validator::{ScriptValidator, ValidationError};
