//! # Animatic Config
//!
//! Unified single-file configuration management for Animatic.
//! A single `animatic.yaml` can configure the server, the retry pipeline, the
//! generation backend, the renderer, and observability settings. Every field
//! has a default so a missing file yields a usable development setup.
//!
//! API keys are never stored in the file; the generator section names the
//! environment variable to read them from.

mod loader;

pub use loader::{load_config, ConfigError};

use serde::Deserialize;

/// Top-level configuration schema for Animatic.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimaticConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for AnimaticConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            generator: GeneratorConfig::default(),
            renderer: RendererConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "animatic".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address, host:port.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Allowed CORS origins; an empty list allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Hard cap on generate→validate→render cycles per request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Scene identifier used when none can be extracted from a script.
    #[serde(default = "default_scene")]
    pub default_scene: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_scene: default_scene(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_scene() -> String {
    "ConceptAnimation".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// OpenAI-compatible chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Outbound request timeout.
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_model() -> String {
    "meta-llama/llama-3.3-70b-instruct:free".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2_000
}

fn default_generator_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Rendering engine executable.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Quality profile: low, medium, or high.
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Root directory the engine writes rendered videos under.
    #[serde(default = "default_output_root")]
    pub output_root: String,
    /// Wall-clock ceiling for one render.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
    /// Directory for transient script files; system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            quality: default_quality(),
            output_root: default_output_root(),
            timeout_secs: default_render_timeout(),
            scratch_dir: None,
        }
    }
}

fn default_binary() -> String {
    "manim".to_string()
}

fn default_quality() -> String {
    "low".to_string()
}

fn default_output_root() -> String {
    "media/videos".to_string()
}

fn default_render_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
