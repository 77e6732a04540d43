/// Prompt enrichment stage
///
/// Turns a terse user description into a [`GenerationBrief`] by calling an
/// [`EnrichmentService`] with a fixed system policy. Blank input is rejected
/// here, before any external call. There is no retry: a failed enrichment
/// fails the request.

use crate::services::{EnrichmentError, EnrichmentRequest, EnrichmentService, GenerationBrief};
use std::sync::Arc;

/// Default sampling temperature for enrichment
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// System policy sent with every enrichment call
pub const CULTURAL_POLICY: &str = r#"
You are the real-time image-generation engine for an Albanian-only application. Your purpose is to receive user descriptions written strictly in the Albanian language and transform them into complete, detailed, professionally structured image-generation prompts in English. Although the final prompt is in English for maximum compatibility and quality, the image must ALWAYS reflect Albanian culture, Albanian environments, Albanian people, Albanian objects, Albanian clothing, Albanian energy, Albanian surroundings, and Albanian context unless the user specifically requests something else.

CORE RULES:
1. All user prompts are in Albanian.
2. You must understand and interpret Albanian perfectly.
3. The visuals MUST look Albanian by default unless the user mentions another nationality.
4. You NEVER output Albanian text.
5. You NEVER output explanations or commentary.
6. You ALWAYS expand the scene into a full cinematic description even if the user's prompt is short.

ALBANIAN CULTURAL ADAPTATION RULES:
- PEOPLE: Mediterranean skin tones, dark/brown hair, natural Balkan facial features.
- LOCATIONS: Beaches (Dhërmi, Ksamil), Streets (Tirana, Shkodër), Mountains (Theth), Balkan cafes.
- OBJECTS: Albanian coffee, Red/Black themes, Balkan household items.
- ATMOSPHERE: Mediterranean light, Balkan urban realism.

You must return the result in JSON format matching the schema provided.
"#;

/// Enrichment settings
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// System policy
    pub system_policy: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            system_policy: CULTURAL_POLICY.trim().to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Enrichment stage over a service
#[derive(Clone)]
pub struct EnrichmentStage {
    service: Arc<dyn EnrichmentService>,
    config: EnrichmentConfig,
}

impl EnrichmentStage {
    /// Creates a stage with the default policy and temperature
    pub fn new(service: Arc<dyn EnrichmentService>) -> Self {
        Self::with_config(service, EnrichmentConfig::default())
    }

    /// Creates a stage with custom settings
    pub fn with_config(service: Arc<dyn EnrichmentService>, config: EnrichmentConfig) -> Self {
        EnrichmentStage { service, config }
    }

    /// Expands `raw_input` into a validated brief
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if the input is blank (no service call is made)
    /// - whatever the service reports otherwise
    pub async fn enrich(&self, raw_input: &str) -> Result<GenerationBrief, EnrichmentError> {
        let input = raw_input.trim();
        if input.is_empty() {
            return Err(EnrichmentError::EmptyInput);
        }

        let request = EnrichmentRequest {
            instruction: format!(
                "Transform this description into a cinematic English prompt: \"{}\"",
                input
            ),
            system_policy: self.config.system_policy.clone(),
            temperature: self.config.temperature,
        };

        tracing::debug!(
            service = self.service.name(),
            input_chars = input.chars().count(),
            "Enriching prompt"
        );

        match self.service.enrich(&request).await {
            Ok(brief) => {
                tracing::debug!("Enrichment produced a complete brief");
                Ok(brief)
            }
            Err(e) => {
                tracing::warn!(service = self.service.name(), error = %e, "Enrichment failed");
                Err(e)
            }
        }
    }
}
