/// External generation services
///
/// The engine talks to three opaque collaborators: an enrichment model that
/// turns a terse description into a [`GenerationBrief`], an image model that
/// renders one artifact per call, and a video model that animates an
/// artifact through a long-running operation.
///
/// Each collaborator is a trait so the orchestrator can run against the
/// Gemini REST API in production and against scripted mocks in tests.
///
/// # Service Contract
///
/// Implementations must:
/// 1. Validate responses eagerly and return typed errors, never partial data
/// 2. Never retry internally (retry policy belongs to the caller)
/// 3. Be cheap to share across tasks (`Send + Sync`, held behind `Arc`)
///
/// # Implementations
///
/// - [`GeminiClient`]: `generateContent` / `predictLongRunning` over reqwest
/// - [`mock`]: deterministic, scriptable services for tests and demo mode

pub mod gemini;
pub mod mock;

pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Enrichment failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentError {
    /// Input was empty or whitespace only
    #[error("Input is empty")]
    EmptyInput,

    /// The enrichment service could not be reached or returned an error status
    #[error("Enrichment service unavailable: {0}")]
    Unavailable(String),

    /// The response could not be decoded
    #[error("Malformed enrichment response: {0}")]
    Malformed(String),

    /// A brief field was absent or blank
    #[error("Enrichment response is missing field '{0}'")]
    MissingField(&'static str),
}

/// Single artifact attempt failures
///
/// These never reach the end user; they are logged and kept as diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The response contained no inline artifact
    #[error("Response contained no artifact")]
    NoPayload,

    /// The attempt exceeded its deadline
    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled before the attempt finished
    #[error("Attempt cancelled")]
    Cancelled,

    /// The attempt task panicked
    #[error("Attempt panicked: {0}")]
    Panicked(String),
}

/// Video extension failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    /// Source image is not a base64 data URI
    #[error("Invalid source image: {0}")]
    InvalidImage(String),

    /// Motion prompt was empty
    #[error("Motion prompt is empty")]
    EmptyPrompt,

    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The operation reported a failure of its own
    #[error("Video operation failed: {0}")]
    OperationFailed(String),

    /// The operation finished without a download URI
    #[error("Video operation returned no video")]
    NoVideo,

    /// Polling gave up before the operation finished
    #[error("Video not ready after {polls} polls")]
    TimedOut { polls: u32 },

    /// The request was cancelled while waiting
    #[error("Video generation cancelled")]
    Cancelled,
}

/// Structured generation brief
///
/// All seven fields are mandatory and non-blank; a brief only exists once it
/// has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBrief {
    /// Cinematic description of the whole moment
    pub scene_overview: String,

    /// Primary subjects: age, clothing, expression, pose
    pub subject_details: String,

    /// Setting
    pub environment: String,

    /// Angle, shot type, focal length, depth of field
    pub camera_composition: String,

    /// Light source, colour temperature, mood
    pub lighting_atmosphere: String,

    /// Rendering style
    pub style_parameters: String,

    /// The literal input handed to the artifact service
    pub final_generation_prompt: String,
}

/// Brief as returned by the model, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBrief {
    scene_overview: Option<String>,
    subject_details: Option<String>,
    environment: Option<String>,
    camera_composition: Option<String>,
    lighting_atmosphere: Option<String>,
    style_parameters: Option<String>,
    final_generation_prompt: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, EnrichmentError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(EnrichmentError::MissingField(field))
}

impl GenerationBrief {
    /// Wire names of the brief fields, in schema order
    pub const FIELDS: [&'static str; 7] = [
        "sceneOverview",
        "subjectDetails",
        "environment",
        "cameraComposition",
        "lightingAtmosphere",
        "styleParameters",
        "finalGenerationPrompt",
    ];

    /// Decodes and validates a model response (camelCase JSON object)
    pub fn from_model_json(text: &str) -> Result<Self, EnrichmentError> {
        let raw: RawBrief =
            serde_json::from_str(text).map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        Ok(GenerationBrief {
            scene_overview: required(raw.scene_overview, "sceneOverview")?,
            subject_details: required(raw.subject_details, "subjectDetails")?,
            environment: required(raw.environment, "environment")?,
            camera_composition: required(raw.camera_composition, "cameraComposition")?,
            lighting_atmosphere: required(raw.lighting_atmosphere, "lightingAtmosphere")?,
            style_parameters: required(raw.style_parameters, "styleParameters")?,
            final_generation_prompt: required(
                raw.final_generation_prompt,
                "finalGenerationPrompt",
            )?,
        })
    }
}

/// Base64 payload with its MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    /// MIME type (e.g. `image/png`)
    pub mime_type: String,

    /// Base64-encoded bytes
    pub data: String,
}

impl InlineData {
    /// Wraps raw bytes
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        InlineData {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`
    pub fn parse_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;

        if mime_type.is_empty() || data.is_empty() || STANDARD.decode(data).is_err() {
            return None;
        }

        Some(InlineData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Renders as a `data:` URI
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One successfully generated artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Index of the attempt that produced it
    pub index: usize,

    /// MIME type
    pub mime_type: String,

    /// Base64-encoded bytes
    pub data: String,
}

impl Artifact {
    /// Tags an inline payload with its attempt index
    pub fn from_inline(index: usize, inline: InlineData) -> Self {
        Artifact {
            index,
            mime_type: inline.mime_type,
            data: inline.data,
        }
    }

    /// Renders as a `data:` URI
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1
    #[default]
    #[serde(rename = "1:1")]
    Square,

    /// 16:9
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// Wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrichment call parameters
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    /// User instruction (already wrapped in the transform template)
    pub instruction: String,

    /// Fixed system policy
    pub system_policy: String,

    /// Sampling temperature
    pub temperature: f32,
}

/// Single artifact call parameters
#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    /// Attempt index within the fan-out
    pub attempt: usize,

    /// Flattened generation prompt
    pub prompt: String,

    /// Requested aspect ratio
    pub aspect_ratio: AspectRatio,
}

/// Video call parameters
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// Source frame
    pub image: InlineData,

    /// Full motion prompt
    pub prompt: String,

    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,

    /// Output resolution (e.g. `720p`)
    pub resolution: String,
}

/// Handle to a running video operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    /// Operation name as returned by the service
    pub name: String,
}

/// Result of polling a video operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPoll {
    /// Still rendering
    Pending,

    /// Finished, video available at `uri`
    Ready { uri: String },
}

/// Prompt enrichment model
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Service name for logging
    fn name(&self) -> &str;

    /// Expands an instruction into a validated brief
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<GenerationBrief, EnrichmentError>;
}

/// Image model producing one artifact per call
#[async_trait]
pub trait ArtifactService: Send + Sync {
    /// Service name for logging
    fn name(&self) -> &str;

    /// Generates a single artifact
    ///
    /// Returns `AttemptError::NoPayload` when the response has no inline data.
    async fn generate(&self, request: &ArtifactRequest) -> Result<InlineData, AttemptError>;
}

/// Long-running video model
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Service name for logging
    fn name(&self) -> &str;

    /// Submits a video job
    async fn start(&self, request: &VideoRequest) -> Result<VideoOperation, VideoError>;

    /// Checks a job once
    async fn poll(&self, operation: &VideoOperation) -> Result<VideoPoll, VideoError>;

    /// Fetches the finished video
    async fn download(&self, uri: &str) -> Result<InlineData, VideoError>;
}
