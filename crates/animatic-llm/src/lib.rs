//! # Animatic LLM
//!
//! Scene-script generation against a chat-completion text service.
//!
//! This crate contains:
//! - `LlmClient`: the outbound text-service boundary, with an HTTP
//!   implementation (OpenAI-compatible chat completions) and a mock
//! - `SceneScriptGenerator`: prompt assembly, corrective reframing of prior
//!   failures, and code-fence stripping of raw completions

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use animatic_core::generator::{GenerateError, ScriptGenerator};
use animatic_core::types::{CandidateScript, GenerationRequest};

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_COMPLETION_LOG_CHARS: usize = 8_000;

/// LLM request payload
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

/// LLM errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// HTTP client config (OpenAI-compatible chat completions)
#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpLlmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// HTTP LLM client using an OpenAI-compatible API
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmClientConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }

        let body = ChatRequest {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Response("Missing choices".to_string()))?;

        Ok(content)
    }
}

/// Mock LLM client for tests/examples
pub struct MockLlmClient {
    pub response: String,
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }
}

/// Generator config for scene scripts
#[derive(Debug, Clone)]
pub struct ScriptGeneratorConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Class name the system instruction asks the model to declare.
    pub scene_class_name: String,
}

impl Default for ScriptGeneratorConfig {
    fn default() -> Self {
        Self {
            model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
            temperature: 0.7,
            max_tokens: 2_000,
            scene_class_name: "ConceptAnimation".to_string(),
        }
    }
}

/// LLM-backed scene-script generator
pub struct SceneScriptGenerator<C: LlmClient> {
    pub client: C,
    pub config: ScriptGeneratorConfig,
}

impl<C: LlmClient> SceneScriptGenerator<C> {
    pub fn new(client: C, config: ScriptGeneratorConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, request: &GenerationRequest) -> (String, String) {
        let system = build_system_prompt(&self.config.scene_class_name);
        let user = match &request.feedback {
            Some(failure) => format!(
                "The previous script failed:\n{}\n\nRegenerate a corrected script for the same request: {}\n\nOutput ONLY the corrected Python code.",
                failure.detail, request.prompt
            ),
            None => request.prompt.clone(),
        };
        (system, user)
    }
}

fn build_system_prompt(scene_class_name: &str) -> String {
    let mut system = String::new();
    system.push_str("You are an expert Manim animation script generator.\n");
    system.push_str("\nHard constraints:\n");
    system.push_str("1) Output ONLY executable Python code - no markdown, no explanations.\n");
    system.push_str("2) Start with: from manim import *\n");
    system.push_str(&format!(
        "3) Create exactly ONE class {}(Scene).\n",
        scene_class_name
    ));
    system.push_str("4) Implement the construct(self) method.\n");
    system.push_str("5) Target Manim Community v0.19.0.\n");
    system.push_str("6) Never use self.camera.frame or self.camera.animate.\n");
    system.push_str("7) Keep total duration between 5 and 10 seconds.\n");
    system.push_str("8) Use self.wait() calls for pacing.\n");
    system.push_str("9) Stick to the named colors BLUE, RED, GREEN, YELLOW, ORANGE, TEAL, PURPLE.\n");
    system.push_str("10) Separate overlapping elements with the buff parameter.\n");
    system
}

/// Strip the first fenced code block from a raw completion.
///
/// The model is told not to use markdown, but completions frequently arrive
/// wrapped anyway. A fence-less completion is returned trimmed, as-is.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for marker in ["```python", "```"] {
        if let Some(start) = trimmed.find(marker) {
            let rest = &trimmed[start + marker.len()..];
            let body = match rest.find("```") {
                Some(end) => &rest[..end],
                None => rest,
            };
            return body.trim();
        }
    }
    trimmed
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

#[async_trait]
impl<C: LlmClient> ScriptGenerator for SceneScriptGenerator<C> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<CandidateScript, GenerateError> {
        let (system, user) = self.build_prompt(request);
        info!(
            model = %self.config.model,
            temperature = self.config.temperature,
            attempt = request.attempt,
            corrective = request.feedback.is_some(),
            "script generation requested"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                system_prompt = %truncate_for_log(&system, MAX_PROMPT_LOG_CHARS),
                user_prompt = %truncate_for_log(&user, MAX_PROMPT_LOG_CHARS),
                "generation prompts"
            );
        }

        let llm_request = LlmRequest {
            system,
            user,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let output = self
            .client
            .complete(llm_request)
            .await
            .map_err(|e| GenerateError::Service(e.to_string()))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                completion = %truncate_for_log(&output, MAX_COMPLETION_LOG_CHARS),
                "raw completion received"
            );
        }

        let script = strip_code_fence(&output);
        if script.is_empty() {
            return Err(GenerateError::InvalidCompletion(
                "completion contained no script text".to_string(),
            ));
        }

        info!(script_chars = script.chars().count(), "script generated");
        Ok(CandidateScript::new(script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animatic_core::failure::AttemptFailure;
    use std::sync::Mutex;

    /// Records the request it was called with and replays a canned response.
    /// Clones share the capture slot so tests keep a probe.
    #[derive(Clone)]
    struct CapturingLlmClient {
        response: String,
        captured: Arc<Mutex<Option<LlmRequest>>>,
    }

    impl CapturingLlmClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                captured: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CapturingLlmClient {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            *self.captured.lock().unwrap() = Some(request);
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_strip_code_fence_handles_python_fence() {
        let raw = "```python\nfrom manim import *\n```";
        assert_eq!(strip_code_fence(raw), "from manim import *");
    }

    #[test]
    fn test_strip_code_fence_handles_bare_fence() {
        let raw = "Here you go:\n```\nfrom manim import *\n```\nEnjoy!";
        assert_eq!(strip_code_fence(raw), "from manim import *");
    }

    #[test]
    fn test_strip_code_fence_handles_unterminated_fence() {
        let raw = "```python\nfrom manim import *";
        assert_eq!(strip_code_fence(raw), "from manim import *");
    }

    #[test]
    fn test_strip_code_fence_passes_fenceless_text_through() {
        let raw = "  from manim import *\n\nclass ConceptAnimation(Scene):\n    pass\n";
        assert_eq!(
            strip_code_fence(raw),
            "from manim import *\n\nclass ConceptAnimation(Scene):\n    pass"
        );
    }

    #[test]
    fn test_system_prompt_states_hard_constraints() {
        let system = build_system_prompt("ConceptAnimation");
        assert!(system.contains("ONE class ConceptAnimation(Scene)"));
        assert!(system.contains("construct(self)"));
        assert!(system.contains("self.camera.frame"));
        assert!(system.contains("from manim import *"));
    }

    #[test]
    fn test_user_message_is_prompt_verbatim_without_feedback() {
        let generator = SceneScriptGenerator::new(
            MockLlmClient {
                response: String::new(),
            },
            ScriptGeneratorConfig::default(),
        );
        let request = GenerationRequest::new("bouncing ball");
        let (_system, user) = generator.build_prompt(&request);
        assert_eq!(user, "bouncing ball");
    }

    #[test]
    fn test_user_message_reframed_with_prior_failure() {
        let generator = SceneScriptGenerator::new(
            MockLlmClient {
                response: String::new(),
            },
            ScriptGeneratorConfig::default(),
        );
        let request = GenerationRequest::new("bouncing ball")
            .with_feedback(AttemptFailure::generation(
                "syntax error at line 3: unexpected ')'",
            ))
            .with_attempt(2);
        let (_system, user) = generator.build_prompt(&request);
        assert!(user.contains("previous script failed"));
        assert!(user.contains("syntax error at line 3"));
        assert!(user.contains("bouncing ball"));
        assert_ne!(user, "bouncing ball");
    }

    #[test]
    fn test_generate_strips_fence_and_forwards_settings() {
        tokio_test::block_on(async {
            let client = CapturingLlmClient::new(
                "```python\nfrom manim import *\n\nclass ConceptAnimation(Scene):\n    def construct(self):\n        self.wait(1)\n```",
            );
            let captured = client.captured.clone();
            let generator = SceneScriptGenerator::new(
                client,
                ScriptGeneratorConfig {
                    model: "test-model".to_string(),
                    temperature: 0.3,
                    max_tokens: 512,
                    scene_class_name: "ConceptAnimation".to_string(),
                },
            );

            let candidate = generator
                .generate(&GenerationRequest::new("bouncing ball"))
                .await
                .expect("generation");
            assert!(candidate.source.starts_with("from manim import *"));
            assert!(!candidate.source.contains("```"));

            let captured = captured.lock().unwrap().take().expect("request");
            assert_eq!(captured.model, "test-model");
            assert_eq!(captured.max_tokens, 512);
            assert!((captured.temperature - 0.3).abs() < f32::EPSILON);
        });
    }

    #[test]
    fn test_empty_completion_is_a_generation_failure() {
        tokio_test::block_on(async {
            let generator = SceneScriptGenerator::new(
                MockLlmClient {
                    response: "```python\n```".to_string(),
                },
                ScriptGeneratorConfig::default(),
            );
            let result = generator
                .generate(&GenerationRequest::new("bouncing ball"))
                .await;
            assert!(matches!(result, Err(GenerateError::InvalidCompletion(_))));
        });
    }
}
