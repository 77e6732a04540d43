/// Gemini REST client
///
/// One `reqwest::Client` serves all three collaborators:
///
/// - Enrichment: `models/{model}:generateContent` with a system instruction
///   and a JSON response schema for the seven brief fields
/// - Images: `models/{model}:generateContent`, response parts scanned for
///   `inlineData`
/// - Video: `models/{model}:predictLongRunning`, then the returned operation
///   is polled by name and the finished file downloaded
///
/// The API key travels in the `x-goog-api-key` header, except for video
/// downloads whose URIs take it as a `key` query parameter.

use super::{
    ArtifactRequest, ArtifactService, AttemptError, EnrichmentError, EnrichmentRequest,
    EnrichmentService, GenerationBrief, InlineData, VideoError, VideoOperation, VideoPoll,
    VideoRequest, VideoService,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,

    /// Base endpoint URL
    pub base_url: String,

    /// Model used for prompt enrichment
    pub enrichment_model: String,

    /// Model used for image generation
    pub image_model: String,

    /// Model used for video generation
    pub video_model: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            enrichment_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Gemini-backed enrichment, image and video services
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Creates a client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS init failure).
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(GeminiClient { http, config })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), name)
    }

    fn download_url(&self, uri: &str) -> String {
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", uri, separator, self.config.api_key)
    }

    /// POSTs `body` and returns the raw response text
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<String, String> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, String> {
    let status = response.status();
    let text = response.text().await.map_err(|e| e.to_string())?;

    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status, truncate(&text, 512)));
    }
    Ok(text)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// JSON schema the enrichment model must answer with
fn brief_schema() -> serde_json::Value {
    let field = |description: &str| json!({ "type": "STRING", "description": description });

    json!({
        "type": "OBJECT",
        "properties": {
            "sceneOverview": field("A detailed, 3-5 sentence cinematic description of the entire moment."),
            "subjectDetails": field("Primary subject(s): age, gender, clothing, expression, pose."),
            "environment": field("Environment description, following the cultural framing rules."),
            "cameraComposition": field("Camera angle, shot type, focal length, depth of field."),
            "lightingAtmosphere": field("Light source, shadow type, color temperature, mood."),
            "styleParameters": field("One specific style, e.g. ultra-photorealistic or cinematic."),
            "finalGenerationPrompt": field("A single fluent English paragraph with no formatting, ready for the image generator."),
        },
        "required": GenerationBrief::FIELDS,
    })
}

// Response structures

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<WireInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: Option<String>,
    data: Option<String>,
}

impl ContentResponse {
    fn first_parts(self) -> Vec<Part> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<VideoResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    generate_video_response: Option<GeneratedVideos>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideos {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    uri: Option<String>,
}

#[async_trait]
impl EnrichmentService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<GenerationBrief, EnrichmentError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_policy }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.instruction }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": brief_schema(),
                "temperature": request.temperature,
            },
        });

        let url = self.model_url(&self.config.enrichment_model, "generateContent");
        let text = self
            .post_json(&url, &body)
            .await
            .map_err(EnrichmentError::Unavailable)?;

        let parsed: ContentResponse =
            serde_json::from_str(&text).map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        let brief_json: String = parsed
            .first_parts()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if brief_json.trim().is_empty() {
            return Err(EnrichmentError::Malformed("no text in response".to_string()));
        }

        GenerationBrief::from_model_json(&brief_json)
    }
}

#[async_trait]
impl ArtifactService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ArtifactRequest) -> Result<InlineData, AttemptError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("Generate a photorealistic image of: {}", request.prompt) }],
            }],
            "generationConfig": {
                "imageConfig": { "aspectRatio": request.aspect_ratio.as_str() },
            },
        });

        let url = self.model_url(&self.config.image_model, "generateContent");
        let text = self
            .post_json(&url, &body)
            .await
            .map_err(AttemptError::Transport)?;

        let parsed: ContentResponse =
            serde_json::from_str(&text).map_err(|e| AttemptError::Malformed(e.to_string()))?;

        parsed
            .first_parts()
            .into_iter()
            .filter_map(|part| part.inline_data)
            .find_map(|inline| {
                let data = inline.data.filter(|d| !d.is_empty())?;
                Some(InlineData {
                    mime_type: inline.mime_type.unwrap_or_else(|| "image/png".to_string()),
                    data,
                })
            })
            .ok_or(AttemptError::NoPayload)
    }
}

#[async_trait]
impl VideoService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn start(&self, request: &VideoRequest) -> Result<VideoOperation, VideoError> {
        let body = json!({
            "instances": [{
                "prompt": request.prompt,
                "image": {
                    "bytesBase64Encoded": request.image.data,
                    "mimeType": request.image.mime_type,
                },
            }],
            "parameters": {
                "sampleCount": 1,
                "resolution": request.resolution,
                "aspectRatio": request.aspect_ratio.as_str(),
            },
        });

        let url = self.model_url(&self.config.video_model, "predictLongRunning");
        let text = self
            .post_json(&url, &body)
            .await
            .map_err(VideoError::Transport)?;

        let parsed: OperationResponse =
            serde_json::from_str(&text).map_err(|e| VideoError::Malformed(e.to_string()))?;

        let name = parsed
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| VideoError::Malformed("operation has no name".to_string()))?;

        Ok(VideoOperation { name })
    }

    async fn poll(&self, operation: &VideoOperation) -> Result<VideoPoll, VideoError> {
        let response = self
            .http
            .get(self.operation_url(&operation.name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| VideoError::Transport(e.to_string()))?;

        let text = read_body(response).await.map_err(VideoError::Transport)?;
        let parsed: OperationResponse =
            serde_json::from_str(&text).map_err(|e| VideoError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(VideoError::OperationFailed(
                error.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        if !parsed.done {
            return Ok(VideoPoll::Pending);
        }

        parsed
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri)
            .map(|uri| VideoPoll::Ready { uri })
            .ok_or(VideoError::NoVideo)
    }

    async fn download(&self, uri: &str) -> Result<InlineData, VideoError> {
        let response = self
            .http
            .get(self.download_url(uri))
            .send()
            .await
            .map_err(|e| VideoError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VideoError::Transport(format!("HTTP {} on download", status)));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VideoError::Transport(e.to_string()))?;

        Ok(InlineData::from_bytes(mime_type, &bytes))
    }
}
