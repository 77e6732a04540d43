/// Fan-out generation stage
///
/// Issues `k` independent artifact attempts for one prompt and gathers
/// whatever succeeds.
///
/// # Scheduling
///
/// ```text
/// t=0          attempt 0 ──────────────┐
/// t=stagger    attempt 1 ───────┐      │
/// t=2×stagger  attempt 2 ──────────────┼─> join all -> order by index
/// ```
///
/// Each attempt is its own tokio task. Attempts never abort their siblings:
/// a failure, timeout or panic is recorded against that attempt index and
/// the rest keep running. Results are ordered by attempt index, never by
/// completion order.
///
/// # Cancellation
///
/// Every attempt runs under a child of the caller's `CancellationToken`.
/// Cancelling the parent abandons all outstanding attempts at once and the
/// stage reports `FanOutError::Cancelled`, even if some attempts had already
/// succeeded.

use crate::services::{
    Artifact, ArtifactRequest, ArtifactService, AspectRatio, AttemptError, InlineData,
};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of attempts per request
pub const DEFAULT_VARIATIONS: usize = 3;

/// Default delay between attempt starts
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(300);

/// Default per-attempt deadline
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fan-out settings
#[derive(Debug, Clone)]
pub struct FanOutConfig {
    /// Attempts per request
    pub variations: usize,

    /// Attempt `i` starts after `i × stagger`
    pub stagger: Duration,

    /// Deadline for a single service call (None = unbounded)
    pub attempt_timeout: Option<Duration>,

    /// Aspect ratio requested from the service
    pub aspect_ratio: AspectRatio,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        FanOutConfig {
            variations: DEFAULT_VARIATIONS,
            stagger: DEFAULT_STAGGER,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
            aspect_ratio: AspectRatio::Square,
        }
    }
}

/// A failed attempt, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    /// Attempt index
    pub attempt: usize,

    /// Failure reason
    pub reason: String,

    #[serde(skip)]
    pub error: AttemptError,
}

impl AttemptFailure {
    fn new(attempt: usize, error: AttemptError) -> Self {
        AttemptFailure {
            attempt,
            reason: error.to_string(),
            error,
        }
    }
}

/// At least one artifact was produced
#[derive(Debug, Clone)]
pub struct FanOutOutcome {
    /// Artifacts in attempt-index order
    pub artifacts: Vec<Artifact>,

    /// Attempts that failed
    pub failures: Vec<AttemptFailure>,
}

/// Fan-out failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum FanOutError {
    /// No attempt produced an artifact
    #[error("All {} generation attempts failed", failures.len())]
    AllAttemptsFailed { failures: Vec<AttemptFailure> },

    /// The request was cancelled
    #[error("Generation cancelled")]
    Cancelled,
}

/// Runs `k` staggered attempts against an artifact service
#[derive(Clone)]
pub struct FanOutStage {
    service: Arc<dyn ArtifactService>,
    config: FanOutConfig,
}

impl FanOutStage {
    /// Creates a stage
    pub fn new(service: Arc<dyn ArtifactService>, config: FanOutConfig) -> Self {
        FanOutStage { service, config }
    }

    /// Stage settings
    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    /// Generates up to `variations` artifacts for `prompt`
    ///
    /// `variations == 0` yields `AllAttemptsFailed` with no failures.
    pub async fn generate(
        &self,
        prompt: &str,
        variations: usize,
        cancel: &CancellationToken,
    ) -> Result<FanOutOutcome, FanOutError> {
        if cancel.is_cancelled() {
            return Err(FanOutError::Cancelled);
        }

        tracing::info!(
            service = self.service.name(),
            variations,
            stagger_ms = self.config.stagger.as_millis() as u64,
            "Starting fan-out"
        );

        let handles: Vec<_> = (0..variations)
            .map(|attempt| {
                let request = ArtifactRequest {
                    attempt,
                    prompt: prompt.to_string(),
                    aspect_ratio: self.config.aspect_ratio,
                };
                let delay = self
                    .config
                    .stagger
                    .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));

                tokio::spawn(run_attempt(
                    self.service.clone(),
                    request,
                    delay,
                    self.config.attempt_timeout,
                    cancel.child_token(),
                ))
            })
            .collect();

        let settled = join_all(handles).await;

        if cancel.is_cancelled() {
            tracing::info!("Fan-out cancelled, discarding results");
            return Err(FanOutError::Cancelled);
        }

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();

        for (attempt, joined) in settled.into_iter().enumerate() {
            let result = joined.unwrap_or_else(|e| Err(AttemptError::Panicked(e.to_string())));

            match result {
                Ok(inline) => artifacts.push(Artifact::from_inline(attempt, inline)),
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "Generation attempt failed");
                    failures.push(AttemptFailure::new(attempt, error));
                }
            }
        }

        if artifacts.is_empty() {
            tracing::warn!(attempts = failures.len(), "All generation attempts failed");
            return Err(FanOutError::AllAttemptsFailed { failures });
        }

        tracing::info!(
            succeeded = artifacts.len(),
            failed = failures.len(),
            "Fan-out complete"
        );

        Ok(FanOutOutcome {
            artifacts,
            failures,
        })
    }
}

async fn run_attempt(
    service: Arc<dyn ArtifactService>,
    request: ArtifactRequest,
    delay: Duration,
    attempt_timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<InlineData, AttemptError> {
    let attempt = request.attempt;

    let work = async {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        tracing::debug!(attempt, "Generation attempt started");
        let call = service.generate(&request);

        match attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout(limit)),
            },
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AttemptError::Cancelled),
        result = work => result,
    }
}
