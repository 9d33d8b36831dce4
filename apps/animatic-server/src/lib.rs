//! HTTP surface for the Animatic pipeline.
//!
//! Thin plumbing around the core: one route submits a prompt and receives the
//! final result record, one route streams previously rendered videos back,
//! and one route reports health. All pipeline decisions live in the core.

use std::net::SocketAddr;
use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use walkdir::WalkDir;

use animatic_config::AnimaticConfig;
use animatic_core::pipeline::{Pipeline, PipelineConfig, PipelineError};
use animatic_llm::{
    HttpLlmClient, HttpLlmClientConfig, SceneScriptGenerator, ScriptGeneratorConfig,
};
use animatic_render::{ManimRenderer, ManimRendererConfig, RenderQuality};
use animatic_validate::StructuralValidator;

type AppPipeline =
    Pipeline<SceneScriptGenerator<HttpLlmClient>, StructuralValidator, ManimRenderer>;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<AppPipeline>,
    output_root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    status: String,
    message: String,
    script: String,
    video_url: String,
    attempts: u32,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    attempts: u32,
}

/// Wire the pipeline from configuration.
pub fn build_pipeline(config: &AnimaticConfig) -> anyhow::Result<AppPipeline> {
    let api_key = config.generator.resolve_api_key();
    if api_key.is_none() {
        tracing::warn!(
            env = %config.generator.api_key_env,
            "generation API key not set; upstream requests will be rejected"
        );
    }

    let client = HttpLlmClient::new(HttpLlmClientConfig {
        endpoint: config.generator.endpoint.clone(),
        api_key,
        timeout_secs: config.generator.timeout_secs,
    })
    .map_err(|err| anyhow::anyhow!("build llm client failed: {}", err))?;

    let generator = SceneScriptGenerator::new(
        client,
        ScriptGeneratorConfig {
            model: config.generator.model.clone(),
            temperature: config.generator.temperature,
            max_tokens: config.generator.max_tokens,
            scene_class_name: config.pipeline.default_scene.clone(),
        },
    );

    let quality: RenderQuality = config
        .renderer
        .quality
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let renderer = ManimRenderer::new(ManimRendererConfig {
        binary: config.renderer.binary.clone(),
        quality,
        output_root: PathBuf::from(&config.renderer.output_root),
        timeout: Duration::from_secs(config.renderer.timeout_secs),
        scratch_dir: config.renderer.scratch_dir.as_ref().map(PathBuf::from),
    });

    Ok(
        Pipeline::new(generator, StructuralValidator::default(), renderer).with_config(
            PipelineConfig {
                max_attempts: config.pipeline.max_attempts,
                default_scene_name: config.pipeline.default_scene.clone(),
            },
        ),
    )
}

/// Run the HTTP server until it terminates.
pub async fn run_server(config: AnimaticConfig, listen: SocketAddr) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(&config)?);
    let state = AppState {
        pipeline,
        output_root: PathBuf::from(&config.renderer.output_root),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate_animation))
        .route("/videos/{filename}", get(serve_video))
        .layer(cors_layer(&config.server.allowed_origins))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    tracing::info!(listen = %listen, "animatic-server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status":"ok"}))
}

async fn generate_animation(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorBody>)> {
    let animation = state
        .pipeline
        .run(&payload.prompt)
        .await
        .map_err(map_pipeline_error)?;

    let video_url = animation
        .artifact
        .file_name()
        .map(|name| format!("/videos/{}", name))
        .unwrap_or_default();

    Ok(Json(GenerateResponse {
        status: "success".to_string(),
        message: "Animation generated successfully".to_string(),
        script: animation.script,
        video_url,
        attempts: animation.attempts_used,
    }))
}

fn map_pipeline_error(err: PipelineError) -> (StatusCode, Json<ErrorBody>) {
    let (status, code, attempts) = match &err {
        PipelineError::EmptyPrompt => (StatusCode::BAD_REQUEST, "invalid_argument", 0),
        PipelineError::Exhausted { attempts, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "generation_failed",
            *attempts,
        ),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
            attempts,
        }),
    )
}

async fn serve_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    if !is_safe_file_name(&filename) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                code: "invalid_argument".to_string(),
                message: "file name must not contain path components".to_string(),
                attempts: 0,
            }),
        ));
    }

    let path = find_video(&state.output_root, &filename).ok_or_else(|| video_not_found(&filename))?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| video_not_found(&filename))?;
    tracing::debug!(path = %path.display(), "serving video");

    let headers = [
        (header::CONTENT_TYPE, "video/mp4"),
        (header::CACHE_CONTROL, "public, max-age=3600"),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

fn video_not_found(filename: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            code: "not_found".to_string(),
            message: format!("video '{}' not found", filename),
            attempts: 0,
        }),
    )
}

/// A retrievable name is exactly one normal path component.
fn is_safe_file_name(name: &str) -> bool {
    let mut components = FsPath::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Recursive search for a previously rendered artifact by bare file name.
fn find_video(output_root: &FsPath, filename: &str) -> Option<PathBuf> {
    WalkDir::new(output_root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            entry.file_type().is_file() && entry.file_name().to_string_lossy() == filename
        })
        .map(|entry| entry.into_path())
}
