//! Retry pipeline
//!
//! The pipeline is the control loop that turns an unreliable generator into a
//! bounded, observable, retryable process:
//! - generate a candidate script (with feedback from the prior failure)
//! - gate it through structural validation
//! - render the validated script and locate the artifact
//!
//! Any failure at any step is recorded as structured feedback and the loop
//! re-enters generation, up to a fixed attempt cap. A script that fails
//! validation is never rendered.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::failure::AttemptFailure;
use crate::generator::ScriptGenerator;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::renderer::SceneRenderer;
use crate::types::{GenerationRequest, RenderedAnimation};
use crate::validator::ScriptValidator;

const MAX_LOG_TEXT_CHARS: usize = 2_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_SCENE_NAME: &str = "ConceptAnimation";

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard cap on generate→validate→render cycles per request.
    pub max_attempts: u32,
    /// Scene identifier used when none can be extracted from the script.
    pub default_scene_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_scene_name: DEFAULT_SCENE_NAME.to_string(),
        }
    }
}

/// Terminal pipeline errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The prompt was empty after trimming. Rejected before the loop:
    /// there is nothing to correct, so this is not retryable.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// All attempts were consumed. Carries the last concrete failure so the
    /// caller can diagnose which stage kept failing.
    #[error("failed after {attempts} attempt(s): {last_failure}")]
    Exhausted {
        attempts: u32,
        last_failure: AttemptFailure,
    },
}

/// The self-correcting generation → validation → render pipeline.
pub struct Pipeline<G, V, R> {
    generator: G,
    validator: V,
    renderer: R,
    config: PipelineConfig,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl<G, V, R> Pipeline<G, V, R>
where
    G: ScriptGenerator,
    V: ScriptValidator,
    R: SceneRenderer,
{
    /// Create a pipeline with default configuration.
    pub fn new(generator: G, validator: V, renderer: R) -> Self {
        Self {
            generator,
            validator,
            renderer,
            config: PipelineConfig::default(),
            observer: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the full pipeline for one prompt.
    ///
    /// Returns the rendered animation together with the number of attempts
    /// actually used, or [`PipelineError::Exhausted`] once the attempt cap is
    /// reached. Intermediate scripts from failed attempts are never surfaced.
    pub async fn run(&self, prompt: &str) -> Result<RenderedAnimation, PipelineError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            run_id = %run_id,
            prompt = %truncate_for_log(prompt, MAX_LOG_TEXT_CHARS),
            max_attempts = self.config.max_attempts,
            "pipeline run started"
        );

        let mut last_failure: Option<AttemptFailure> = None;
        for attempt in 1..=self.config.max_attempts {
            self.report(PipelineEvent::new(&run_id, attempt, "attempt_started"))
                .await;
            tracing::info!(
                run_id = %run_id,
                attempt,
                max_attempts = self.config.max_attempts,
                "attempt started"
            );

            match self
                .run_attempt(&run_id, prompt, attempt, last_failure.take())
                .await
            {
                Ok(animation) => {
                    tracing::info!(
                        run_id = %run_id,
                        attempt,
                        scene = %animation.scene_name,
                        artifact = %animation.artifact.path.display(),
                        "pipeline run succeeded"
                    );
                    self.report(
                        PipelineEvent::new(&run_id, attempt, "pipeline_succeeded")
                            .with_message(animation.artifact.path.display().to_string()),
                    )
                    .await;
                    return Ok(animation);
                }
                Err(failure) => {
                    tracing::warn!(
                        run_id = %run_id,
                        attempt,
                        kind = %failure.kind,
                        detail = %truncate_for_log(&failure.detail, MAX_LOG_TEXT_CHARS),
                        "attempt failed"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let last_failure = last_failure
            .unwrap_or_else(|| AttemptFailure::generation("no attempts were permitted"));
        tracing::error!(
            run_id = %run_id,
            attempts = self.config.max_attempts,
            kind = %last_failure.kind,
            detail = %truncate_for_log(&last_failure.detail, MAX_LOG_TEXT_CHARS),
            "pipeline run exhausted"
        );
        self.report(
            PipelineEvent::new(&run_id, self.config.max_attempts, "pipeline_exhausted")
                .with_failure(last_failure.clone()),
        )
        .await;
        Err(PipelineError::Exhausted {
            attempts: self.config.max_attempts,
            last_failure,
        })
    }

    /// One generate→validate→render cycle.
    async fn run_attempt(
        &self,
        run_id: &str,
        prompt: &str,
        attempt: u32,
        feedback: Option<AttemptFailure>,
    ) -> Result<RenderedAnimation, AttemptFailure> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            feedback,
            attempt,
        };

        let candidate = match self.generator.generate(&request).await {
            Ok(candidate) => candidate,
            Err(err) => {
                let failure = AttemptFailure::from(err);
                self.report(
                    PipelineEvent::new(run_id, attempt, "generation_failed")
                        .with_failure(failure.clone()),
                )
                .await;
                return Err(failure);
            }
        };
        tracing::debug!(
            run_id = %run_id,
            attempt,
            script_chars = candidate.source.chars().count(),
            "script generated"
        );

        if let Err(err) = self.validator.validate(&candidate.source) {
            let failure = AttemptFailure::from(err);
            self.report(
                PipelineEvent::new(run_id, attempt, "validation_failed")
                    .with_failure(failure.clone()),
            )
            .await;
            return Err(failure);
        }

        let scene_name = self
            .validator
            .extract_scene_name(&candidate.source)
            .unwrap_or_else(|| self.config.default_scene_name.clone());
        tracing::debug!(
            run_id = %run_id,
            attempt,
            scene = %scene_name,
            "script validated"
        );

        match self.renderer.render(&candidate.source, &scene_name).await {
            Ok(artifact) => Ok(RenderedAnimation {
                script: candidate.source,
                scene_name,
                artifact,
                attempts_used: attempt,
                rendered_at: Utc::now(),
            }),
            Err(err) => {
                let failure = AttemptFailure::from(err);
                self.report(
                    PipelineEvent::new(run_id, attempt, "render_failed")
                        .with_failure(failure.clone()),
                )
                .await;
                Err(failure)
            }
        }
    }

    async fn report(&self, event: PipelineEvent) {
        if let Some(observer) = &self.observer {
            if let Err(err) = observer.observe(event).await {
                tracing::warn!("failed to report pipeline progress: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::RwLock;

    use crate::failure::FailureKind;
    use crate::generator::GenerateError;
    use crate::renderer::RenderError;
    use crate::types::{CandidateScript, RenderedArtifact};
    use crate::validator::ValidationError;

    const VALID_SCRIPT: &str = "from manim import *\n\nclass ConceptAnimation(Scene):\n    def construct(self):\n        self.wait(1)\n";
    const SCRIPT_WITHOUT_IMPORT: &str =
        "class ConceptAnimation(Scene):\n    def construct(self):\n        self.wait(1)\n";

    /// Replays a scripted sequence of generation outcomes and records the
    /// requests it was called with. Clones share state so tests keep a probe.
    #[derive(Clone)]
    struct ScriptedGenerator {
        responses: Arc<Mutex<VecDeque<Result<String, GenerateError>>>>,
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
                requests: Arc::new(Mutex::new(Vec::new())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn recorded_requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<CandidateScript, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(source)) => Ok(CandidateScript::new(source)),
                Some(Err(err)) => Err(err),
                None => Err(GenerateError::Service("no scripted response".to_string())),
            }
        }
    }

    /// Checks the marker the scripted generator plants instead of parsing.
    struct RuleValidator;

    impl ScriptValidator for RuleValidator {
        fn validate(&self, source: &str) -> Result<(), ValidationError> {
            if source.trim().is_empty() {
                return Err(ValidationError::EmptyScript);
            }
            if !source.contains("from manim import") {
                return Err(ValidationError::MissingImport {
                    module: "manim".to_string(),
                });
            }
            Ok(())
        }

        fn extract_scene_name(&self, source: &str) -> Option<String> {
            source
                .contains("class ConceptAnimation(Scene)")
                .then(|| "ConceptAnimation".to_string())
        }
    }

    /// Always rejects with the given error.
    struct RejectingValidator {
        error: ValidationError,
    }

    impl ScriptValidator for RejectingValidator {
        fn validate(&self, _source: &str) -> Result<(), ValidationError> {
            Err(self.error.clone())
        }

        fn extract_scene_name(&self, _source: &str) -> Option<String> {
            None
        }
    }

    /// Accepts everything, extracts nothing.
    struct AcceptingValidator;

    impl ScriptValidator for AcceptingValidator {
        fn validate(&self, _source: &str) -> Result<(), ValidationError> {
            Ok(())
        }

        fn extract_scene_name(&self, _source: &str) -> Option<String> {
            None
        }
    }

    /// Replays scripted render outcomes and counts invocations.
    #[derive(Clone)]
    struct ScriptedRenderer {
        responses: Arc<Mutex<VecDeque<Result<RenderedArtifact, RenderError>>>>,
        calls: Arc<AtomicUsize>,
        scenes: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedRenderer {
        fn always_ok() -> Self {
            Self::new(Vec::new())
        }

        fn new(responses: Vec<Result<RenderedArtifact, RenderError>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
                calls: Arc::new(AtomicUsize::new(0)),
                scenes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn rendered_scenes(&self) -> Vec<String> {
            self.scenes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SceneRenderer for ScriptedRenderer {
        async fn render(
            &self,
            _source: &str,
            scene_name: &str,
        ) -> Result<RenderedArtifact, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scenes.lock().unwrap().push(scene_name.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(result) => result,
                None => Ok(RenderedArtifact::new(format!(
                    "media/videos/tmp/480p15/{}.mp4",
                    scene_name
                ))),
            }
        }
    }

    struct CollectObserver {
        events: Arc<RwLock<Vec<PipelineEvent>>>,
    }

    impl CollectObserver {
        fn new() -> Self {
            Self {
                events: Arc::new(RwLock::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PipelineObserver for CollectObserver {
        async fn observe(&self, event: PipelineEvent) -> Result<(), String> {
            self.events.write().await.push(event);
            Ok(())
        }
    }

    #[test]
    fn test_empty_prompt_rejected_without_generation() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![Ok(VALID_SCRIPT.to_string())]);
            let renderer = ScriptedRenderer::always_ok();
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let result = pipeline.run("   \n\t ").await;
            assert!(matches!(result, Err(PipelineError::EmptyPrompt)));
            assert_eq!(generator.calls(), 0);
            assert_eq!(renderer.calls(), 0);
        });
    }

    #[test]
    fn test_first_attempt_success_reports_one_attempt() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![Ok(VALID_SCRIPT.to_string())]);
            let renderer = ScriptedRenderer::always_ok();
            let observer = Arc::new(CollectObserver::new());
            let events_ref = observer.events.clone();
            let pipeline =
                Pipeline::new(generator.clone(), RuleValidator, renderer.clone()).with_observer(observer);

            let animation = pipeline.run("bouncing ball").await.expect("success");
            assert_eq!(animation.attempts_used, 1);
            assert_eq!(animation.scene_name, "ConceptAnimation");
            assert_eq!(
                animation.artifact.file_name(),
                Some("ConceptAnimation.mp4")
            );
            assert_eq!(generator.calls(), 1);

            let phases: Vec<String> = events_ref
                .read()
                .await
                .iter()
                .map(|e| e.phase.clone())
                .collect();
            assert!(phases.iter().any(|p| p == "attempt_started"));
            assert!(phases.iter().any(|p| p == "pipeline_succeeded"));
        });
    }

    #[test]
    fn test_validation_failure_feeds_back_and_second_attempt_succeeds() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Ok(SCRIPT_WITHOUT_IMPORT.to_string()),
                Ok(VALID_SCRIPT.to_string()),
            ]);
            let renderer = ScriptedRenderer::always_ok();
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let animation = pipeline.run("bouncing ball").await.expect("success");
            assert_eq!(animation.attempts_used, 2);

            let requests = generator.recorded_requests();
            assert_eq!(requests.len(), 2);
            assert!(requests[0].feedback.is_none());
            let feedback = requests[1].feedback.as_ref().expect("feedback");
            assert_eq!(feedback.kind, FailureKind::MissingImport);
            // only the validated script reached the renderer
            assert_eq!(renderer.calls(), 1);
        });
    }

    #[test]
    fn test_invalid_script_never_reaches_renderer() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Ok("pass".to_string()),
                Ok("pass".to_string()),
                Ok("pass".to_string()),
            ]);
            let renderer = ScriptedRenderer::always_ok();
            let validator = RejectingValidator {
                error: ValidationError::Syntax {
                    line: 2,
                    message: "unexpected indent".to_string(),
                },
            };
            let pipeline = Pipeline::new(generator.clone(), validator, renderer.clone());

            let result = pipeline.run("bouncing ball").await;
            match result {
                Err(PipelineError::Exhausted {
                    attempts,
                    last_failure,
                }) => {
                    assert_eq!(attempts, 3);
                    assert_eq!(last_failure.kind, FailureKind::Syntax);
                    assert!(last_failure.detail.contains("line 2"));
                }
                other => panic!("expected exhausted error, got {:?}", other.map(|_| ())),
            }
            assert_eq!(generator.calls(), 3);
            assert_eq!(renderer.calls(), 0);
        });
    }

    #[test]
    fn test_generation_errors_never_exceed_attempt_cap() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Err(GenerateError::Service("HTTP 500".to_string())),
                Err(GenerateError::Service("timeout".to_string())),
                Err(GenerateError::InvalidCompletion("empty".to_string())),
            ]);
            let renderer = ScriptedRenderer::always_ok();
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let result = pipeline.run("bouncing ball").await;
            match result {
                Err(PipelineError::Exhausted {
                    attempts,
                    last_failure,
                }) => {
                    assert_eq!(attempts, 3);
                    assert_eq!(last_failure.kind, FailureKind::Generation);
                }
                other => panic!("expected exhausted error, got {:?}", other.map(|_| ())),
            }
            assert_eq!(generator.calls(), 3);
        });
    }

    #[test]
    fn test_success_on_final_attempt_makes_no_further_calls() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Err(GenerateError::Service("HTTP 500".to_string())),
                Err(GenerateError::Service("HTTP 500".to_string())),
                Ok(VALID_SCRIPT.to_string()),
            ]);
            let renderer = ScriptedRenderer::always_ok();
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let animation = pipeline.run("bouncing ball").await.expect("success");
            assert_eq!(animation.attempts_used, 3);
            assert_eq!(generator.calls(), 3);
        });
    }

    #[test]
    fn test_render_failure_feeds_back_into_next_attempt() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Ok(VALID_SCRIPT.to_string()),
                Ok(VALID_SCRIPT.to_string()),
            ]);
            let renderer = ScriptedRenderer::new(vec![
                Err(RenderError::ArtifactNotFound {
                    scene: "ConceptAnimation".to_string(),
                }),
                Ok(RenderedArtifact::new(
                    "media/videos/tmp/480p15/ConceptAnimation.mp4",
                )),
            ]);
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let animation = pipeline.run("bouncing ball").await.expect("success");
            assert_eq!(animation.attempts_used, 2);
            assert_eq!(renderer.calls(), 2);

            let requests = generator.recorded_requests();
            let feedback = requests[1].feedback.as_ref().expect("feedback");
            assert_eq!(feedback.kind, FailureKind::ArtifactNotFound);
        });
    }

    #[test]
    fn test_default_scene_name_used_when_extraction_fails() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![Ok(VALID_SCRIPT.to_string())]);
            let renderer = ScriptedRenderer::always_ok();
            let pipeline = Pipeline::new(generator.clone(), AcceptingValidator, renderer.clone()).with_config(
                PipelineConfig {
                    max_attempts: 3,
                    default_scene_name: "FallbackScene".to_string(),
                },
            );

            let animation = pipeline.run("bouncing ball").await.expect("success");
            assert_eq!(animation.scene_name, "FallbackScene");
            assert_eq!(renderer.rendered_scenes(), vec!["FallbackScene".to_string()]);
        });
    }

    #[test]
    fn test_exhausted_surfaces_last_failure_across_mixed_stages() {
        tokio_test::block_on(async {
            // attempt 1: generation error, attempt 2: validation error,
            // attempt 3: render timeout -> last failure is the timeout
            let generator = ScriptedGenerator::new(vec![
                Err(GenerateError::Service("HTTP 502".to_string())),
                Ok(SCRIPT_WITHOUT_IMPORT.to_string()),
                Ok(VALID_SCRIPT.to_string()),
            ]);
            let renderer =
                ScriptedRenderer::new(vec![Err(RenderError::Timeout { timeout_secs: 120 })]);
            let pipeline = Pipeline::new(generator.clone(), RuleValidator, renderer.clone());

            let result = pipeline.run("bouncing ball").await;
            match result {
                Err(PipelineError::Exhausted {
                    attempts,
                    last_failure,
                }) => {
                    assert_eq!(attempts, 3);
                    assert_eq!(last_failure.kind, FailureKind::RenderTimeout);
                }
                other => panic!("expected exhausted error, got {:?}", other.map(|_| ())),
            }
        });
    }

    #[test]
    fn test_failure_events_carry_structured_failures() {
        tokio_test::block_on(async {
            let generator = ScriptedGenerator::new(vec![
                Ok(SCRIPT_WITHOUT_IMPORT.to_string()),
                Ok(VALID_SCRIPT.to_string()),
            ]);
            let renderer = ScriptedRenderer::always_ok();
            let observer = Arc::new(CollectObserver::new());
            let events_ref = observer.events.clone();
            let pipeline =
                Pipeline::new(generator.clone(), RuleValidator, renderer.clone()).with_observer(observer);

            pipeline.run("bouncing ball").await.expect("success");

            let events = events_ref.read().await;
            let validation_failed = events
                .iter()
                .find(|e| e.phase == "validation_failed")
                .expect("validation_failed event");
            assert_eq!(validation_failed.attempt, 1);
            assert_eq!(
                validation_failed.failure.as_ref().map(|f| f.kind),
                Some(FailureKind::MissingImport)
            );
        });
    }
}
