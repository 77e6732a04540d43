/// Video extension
///
/// Animates one previously generated artifact. The video model works as a
/// long-running operation, so the flow is submit, poll, download:
///
/// ```text
/// start(image, prompt) -> operation
///   loop: sleep(poll_interval) -> poll(operation)
///     Pending        -> keep waiting (bounded by max_polls and deadline)
///     Ready { uri }  -> download(uri) -> video
/// ```
///
/// Polling is bounded by both a poll count and an overall deadline, and
/// every wait is cancellable. Video extension does not consume quota.

use crate::services::{
    AspectRatio, InlineData, VideoError, VideoPoll, VideoRequest, VideoService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default maximum number of polls
pub const DEFAULT_MAX_POLLS: u32 = 100;

/// Video settings
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Delay between polls
    pub poll_interval: Duration,

    /// Give up after this many polls
    pub max_polls: u32,

    /// Give up after this much time overall
    pub deadline: Duration,

    /// Output resolution
    pub resolution: String,

    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            deadline: Duration::from_secs(600),
            resolution: "720p".to_string(),
            aspect_ratio: AspectRatio::Landscape,
        }
    }
}

/// Runs video jobs to completion
#[derive(Clone)]
pub struct VideoExtender {
    service: Arc<dyn VideoService>,
    config: VideoConfig,
}

impl VideoExtender {
    /// Creates an extender
    pub fn new(service: Arc<dyn VideoService>, config: VideoConfig) -> Self {
        VideoExtender { service, config }
    }

    /// Animates `image_data_uri` following `prompt`
    ///
    /// # Errors
    ///
    /// - `InvalidImage` / `EmptyPrompt` before any service call
    /// - `TimedOut` when the job is still pending after the poll bound or
    ///   deadline
    /// - `Cancelled` when `cancel` fires during any wait
    pub async fn extend(
        &self,
        image_data_uri: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<InlineData, VideoError> {
        let image = InlineData::parse_data_uri(image_data_uri)
            .ok_or_else(|| VideoError::InvalidImage("expected a base64 data URI".to_string()))?;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(VideoError::EmptyPrompt);
        }

        let request = VideoRequest {
            image,
            prompt: format!("Cinematic movement, {}", prompt),
            aspect_ratio: self.config.aspect_ratio,
            resolution: self.config.resolution.clone(),
        };

        let operation = cancellable(cancel, self.service.start(&request)).await?;
        tracing::info!(operation = %operation.name, "Video operation started");

        let deadline = Instant::now() + self.config.deadline;
        let mut polls = 0;

        let uri = loop {
            let out_of_time = Instant::now() + self.config.poll_interval > deadline;
            if polls >= self.config.max_polls || out_of_time {
                tracing::warn!(operation = %operation.name, polls, "Video operation timed out");
                return Err(VideoError::TimedOut { polls });
            }

            cancellable(cancel, async {
                tokio::time::sleep(self.config.poll_interval).await;
                Ok(())
            })
            .await?;

            polls += 1;
            match cancellable(cancel, self.service.poll(&operation)).await? {
                VideoPoll::Pending => {
                    tracing::debug!(operation = %operation.name, polls, "Video still rendering");
                }
                VideoPoll::Ready { uri } => break uri,
            }
        };

        let video = cancellable(cancel, self.service.download(&uri)).await?;
        tracing::info!(
            operation = %operation.name,
            polls,
            mime_type = %video.mime_type,
            "Video ready"
        );
        Ok(video)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = Result<T, VideoError>>,
) -> Result<T, VideoError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VideoError::Cancelled),
        result = work => result,
    }
}
