/// Mock services for testing and demos
///
/// These services never leave the process. They are useful for:
/// - Testing the orchestrator without network access
/// - Running the API in demo mode when no Gemini key is configured
/// - Reproducing timing-dependent fan-out behavior deterministically
///
/// # Scripting Attempts
///
/// [`MockArtifactService`] looks up each attempt index in a script. An entry
/// says how long the attempt takes and how it ends; indices past the end of
/// the script succeed immediately.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use vistagen_engine::services::mock::{MockArtifactService, MockAttempt};
/// use vistagen_engine::services::AttemptError;
///
/// let service = MockArtifactService::with_script(vec![
///     MockAttempt::succeed().after(Duration::from_millis(500)),
///     MockAttempt::fail(AttemptError::NoPayload),
///     MockAttempt::succeed(),
/// ]);
/// assert_eq!(service.calls(), 0);
/// ```

use super::{
    ArtifactRequest, ArtifactService, AttemptError, EnrichmentError, EnrichmentRequest,
    EnrichmentService, GenerationBrief, InlineData, VideoError, VideoOperation, VideoPoll,
    VideoRequest, VideoService,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 1x1 transparent PNG
pub const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Deterministic brief for `instruction`
pub fn sample_brief(instruction: &str) -> GenerationBrief {
    GenerationBrief {
        scene_overview: format!("A cinematic moment based on: {}", instruction),
        subject_details: "A local resident in everyday clothing, relaxed pose.".to_string(),
        environment: "A sunlit Mediterranean street lined with cafes.".to_string(),
        camera_composition: "35mm lens, eye level, shallow depth of field.".to_string(),
        lighting_atmosphere: "Warm late-afternoon light, soft shadows.".to_string(),
        style_parameters: "Ultra-photorealistic.".to_string(),
        final_generation_prompt: format!(
            "A photorealistic Mediterranean street scene: {}",
            instruction
        ),
    }
}

/// Scripted enrichment
#[derive(Debug, Default)]
pub struct MockEnrichmentService {
    failure: Option<EnrichmentError>,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<EnrichmentRequest>>,
}

impl MockEnrichmentService {
    /// Always answers with [`sample_brief`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always fails with `error`
    pub fn failing(error: EnrichmentError) -> Self {
        MockEnrichmentService {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Waits `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request, if any
    pub fn last_request(&self) -> Option<EnrichmentRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EnrichmentService for MockEnrichmentService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<GenerationBrief, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(sample_brief(&request.instruction)),
        }
    }
}

/// How a scripted attempt ends
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Returns [`PLACEHOLDER_PNG`]
    Succeed,

    /// Returns the error
    Fail(AttemptError),

    /// Never returns
    Hang,

    /// Panics
    Panic,
}

/// One scripted attempt
#[derive(Debug, Clone)]
pub struct MockAttempt {
    /// Time before the outcome is produced
    pub delay: Duration,

    /// Outcome
    pub outcome: MockOutcome,
}

impl MockAttempt {
    /// Immediate success
    pub fn succeed() -> Self {
        MockAttempt {
            delay: Duration::ZERO,
            outcome: MockOutcome::Succeed,
        }
    }

    /// Immediate failure
    pub fn fail(error: AttemptError) -> Self {
        MockAttempt {
            delay: Duration::ZERO,
            outcome: MockOutcome::Fail(error),
        }
    }

    /// Never finishes
    pub fn hang() -> Self {
        MockAttempt {
            delay: Duration::ZERO,
            outcome: MockOutcome::Hang,
        }
    }

    /// Panics inside the attempt task
    pub fn panic() -> Self {
        MockAttempt {
            delay: Duration::ZERO,
            outcome: MockOutcome::Panic,
        }
    }

    /// Delays the outcome
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scripted image generation
#[derive(Debug)]
pub struct MockArtifactService {
    script: Vec<MockAttempt>,
    fallback: MockAttempt,
    calls: AtomicUsize,
}

impl MockArtifactService {
    /// Every attempt succeeds immediately
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new())
    }

    /// Every attempt fails with a transport error
    pub fn failing() -> Self {
        MockArtifactService {
            script: Vec::new(),
            fallback: MockAttempt::fail(AttemptError::Transport("mock outage".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Attempt `i` follows `script[i]`; later attempts succeed
    pub fn with_script(script: Vec<MockAttempt>) -> Self {
        MockArtifactService {
            script,
            fallback: MockAttempt::succeed(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of attempts started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactService for MockArtifactService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ArtifactRequest) -> Result<InlineData, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.get(request.attempt).unwrap_or(&self.fallback);

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        match &step.outcome {
            MockOutcome::Succeed => Ok(InlineData {
                mime_type: "image/png".to_string(),
                data: PLACEHOLDER_PNG.to_string(),
            }),
            MockOutcome::Fail(error) => Err(error.clone()),
            MockOutcome::Hang => std::future::pending().await,
            MockOutcome::Panic => panic!("scripted panic in attempt {}", request.attempt),
        }
    }
}

/// Video job that finishes after a fixed number of polls
#[derive(Debug)]
pub struct MockVideoService {
    ready_after: Option<u32>,
    polls: AtomicU32,
}

impl MockVideoService {
    /// Ready on the `ready_after`-th poll
    pub fn ready_after(polls: u32) -> Self {
        MockVideoService {
            ready_after: Some(polls),
            polls: AtomicU32::new(0),
        }
    }

    /// Never finishes
    pub fn never_ready() -> Self {
        MockVideoService {
            ready_after: None,
            polls: AtomicU32::new(0),
        }
    }

    /// Number of polls made
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoService for MockVideoService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self, _request: &VideoRequest) -> Result<VideoOperation, VideoError> {
        Ok(VideoOperation {
            name: "operations/mock-video".to_string(),
        })
    }

    async fn poll(&self, _operation: &VideoOperation) -> Result<VideoPoll, VideoError> {
        let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;

        match self.ready_after {
            Some(ready) if count >= ready => Ok(VideoPoll::Ready {
                uri: "mock://videos/1".to_string(),
            }),
            _ => Ok(VideoPoll::Pending),
        }
    }

    async fn download(&self, _uri: &str) -> Result<InlineData, VideoError> {
        Ok(InlineData::from_bytes("video/mp4", b"mock video bytes"))
    }
}
