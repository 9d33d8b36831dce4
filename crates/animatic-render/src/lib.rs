//! # Animatic Render
//!
//! Subprocess execution of the external rendering engine.
//!
//! A validated script is persisted to a uniquely named temporary file, the
//! engine is invoked as a child process under a wall-clock ceiling, and the
//! produced artifact is located on disk by convention:
//! `<output_root>/<script_stem>/<quality_dir>/<scene>.mp4`.
//!
//! The temporary script file is owned exclusively by one render call and is
//! removed on every exit path. A zero exit status without a located artifact
//! is still a failure.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use animatic_core::renderer::{RenderError, SceneRenderer};
use animatic_core::types::RenderedArtifact;

const MAX_LOG_TEXT_CHARS: usize = 2_000;
const VIDEO_EXT: &str = "mp4";

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Rendering quality profile, mapped to the engine's quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl RenderQuality {
    /// Command-line flag selecting this profile.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Low => "-ql",
            Self::Medium => "-qm",
            Self::High => "-qh",
        }
    }
}

impl std::str::FromStr for RenderQuality {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::Low),
            "m" | "medium" => Ok(Self::Medium),
            "h" | "high" => Ok(Self::High),
            other => Err(format!("unknown render quality '{}'", other)),
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct ManimRendererConfig {
    /// Rendering engine executable.
    pub binary: String,
    /// Quality profile passed to the engine.
    pub quality: RenderQuality,
    /// Root directory the engine writes rendered videos under.
    pub output_root: PathBuf,
    /// Wall-clock ceiling for one render; the child is killed on expiry.
    pub timeout: Duration,
    /// Directory for transient script files; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ManimRendererConfig {
    fn default() -> Self {
        Self {
            binary: "manim".to_string(),
            quality: RenderQuality::Low,
            output_root: PathBuf::from("media/videos"),
            timeout: Duration::from_secs(120),
            scratch_dir: None,
        }
    }
}

/// Subprocess-backed implementation of [`SceneRenderer`].
pub struct ManimRenderer {
    config: ManimRendererConfig,
}

impl ManimRenderer {
    pub fn new(config: ManimRendererConfig) -> Self {
        Self { config }
    }

    fn write_script(&self, source: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("animatic-").suffix(".py");
        let mut file = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(source.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    fn locate_artifact(&self, stem: &str, scene_name: &str) -> Option<PathBuf> {
        let search_dir = self.config.output_root.join(stem);
        if !search_dir.is_dir() {
            debug!(dir = %search_dir.display(), "render output directory missing");
            return None;
        }
        let wanted = format!("{}.{}", scene_name, VIDEO_EXT);
        WalkDir::new(&search_dir)
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| {
                entry.file_type().is_file() && entry.file_name().to_string_lossy() == wanted
            })
            .map(|entry| entry.into_path())
    }
}

#[async_trait]
impl SceneRenderer for ManimRenderer {
    async fn render(
        &self,
        source: &str,
        scene_name: &str,
    ) -> Result<RenderedArtifact, RenderError> {
        // Dropping `script` removes the temp file; every return below drops it.
        let script = self
            .write_script(source)
            .map_err(|e| RenderError::Io(format!("failed to persist script: {}", e)))?;
        let script_path = script.path().to_path_buf();
        let stem = script_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut command = Command::new(&self.config.binary);
        command
            .arg(self.config.quality.flag())
            .arg(&script_path)
            .arg(scene_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        info!(
            binary = %self.config.binary,
            quality = self.config.quality.flag(),
            script = %script_path.display(),
            scene = %scene_name,
            "invoking renderer"
        );

        let output = match timeout(self.config.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(RenderError::Io(format!(
                    "failed to run '{}': {}",
                    self.config.binary, err
                )));
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    scene = %scene_name,
                    "render timed out; child process killed"
                );
                return Err(RenderError::Timeout {
                    timeout_secs: self.config.timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if tracing::enabled!(tracing::Level::DEBUG) {
            let stdout = String::from_utf8_lossy(&output.stdout);
            debug!(
                status = output.status.code().unwrap_or(-1),
                stdout = %truncate_for_log(&stdout, MAX_LOG_TEXT_CHARS),
                stderr = %truncate_for_log(&stderr, MAX_LOG_TEXT_CHARS),
                "renderer finished"
            );
        }

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let artifact = self.locate_artifact(&stem, scene_name).ok_or_else(|| {
            RenderError::ArtifactNotFound {
                scene: scene_name.to_string(),
            }
        })?;
        info!(artifact = %artifact.display(), scene = %scene_name, "artifact located");
        Ok(RenderedArtifact::new(artifact))
    }
}
