//! Scene renderer abstraction
//!
//! The renderer is an external-tool boundary: the real implementation shells
//! out to the rendering engine, while tests inject a fake that returns canned
//! results without ever spawning a process.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::RenderedArtifact;

/// Render errors surfaced to the pipeline, one variant per failure mode.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer exited with a non-zero status.
    #[error("renderer exited with status {status}: {stderr}")]
    Failed {
        /// Exit status code, -1 when terminated by signal.
        status: i32,
        /// Captured standard error text.
        stderr: String,
    },

    /// The renderer exceeded its wall-clock ceiling and was terminated.
    /// No partial artifact is assumed usable.
    #[error("render timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The renderer exited cleanly but no artifact was located under the
    /// expected output convention. Exit status alone is not proof of success.
    #[error("no rendered artifact found for scene '{scene}'")]
    ArtifactNotFound { scene: String },

    /// Filesystem or process-spawn failure around the render itself.
    #[error("render io error: {0}")]
    Io(String),
}

/// Scene renderer trait
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    /// Render `source` as `scene_name` and locate the produced artifact.
    ///
    /// May block up to the implementation's configured wall-clock ceiling.
    /// Implementations must remove any transient script file on every exit
    /// path before returning.
    async fn render(&self, source: &str, scene_name: &str)
        -> Result<RenderedArtifact, RenderError>;
}

#[async_trait]
impl SceneRenderer for std::sync::Arc<dyn SceneRenderer> {
    async fn render(
        &self,
        source: &str,
        scene_name: &str,
    ) -> Result<RenderedArtifact, RenderError> {
        (**self).render(source, scene_name).await
    }
}
