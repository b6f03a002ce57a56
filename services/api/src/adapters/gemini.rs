//! services/api/src/adapters/gemini.rs
//!
//! Google Gemini adapter using the `generateContent` REST endpoint with a
//! response schema, so the model is constrained to the activity JSON shape.

use activity_planner_core::{
    ActivityProvider, GeneratedActivity, GenerationCause, GenerationRequest, KeyValidation,
    PortError, PortResult, Provider,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::http::post_json;
use super::parsing::parse_activity;
use super::prompt::{build_prompt, OutputFormat, PROBE_PROMPT, SYSTEM_PROMPT};
use crate::config::{GenerationSettings, ProviderSettings};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Schema for the activity object in Gemini's OpenAPI subset.
fn activity_schema() -> Value {
    let string = json!({ "type": "STRING" });
    let strings = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "type": "OBJECT",
        "properties": {
            "title": string,
            "smartObjective": string,
            "description": string,
            "materials": strings,
            "procedure": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": string,
                        "time": { "type": "NUMBER" },
                        "description": string
                    },
                    "required": ["name", "time", "description"]
                }
            },
            "evaluation": {
                "type": "OBJECT",
                "properties": {
                    "criteria": string,
                    "methods": strings,
                    "feedback": string
                }
            },
            "adaptations": strings,
            "theoreticalFoundation": string
        },
        "required": ["title", "smartObjective", "materials", "procedure"]
    })
}

pub struct GeminiAdapter {
    http: reqwest::Client,
    settings: ProviderSettings,
    generation: GenerationSettings,
}

impl GeminiAdapter {
    pub fn new(
        http: reqwest::Client,
        settings: ProviderSettings,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            http,
            settings,
            generation,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(
        &self,
        api_key: &SecretString,
        model: &str,
        body: &Value,
    ) -> Result<GenerateContentResponse, GenerationCause> {
        let builder = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, api_key.expose_secret());
        post_json(builder, body).await
    }
}

#[async_trait]
impl ActivityProvider for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    #[tracing::instrument(skip(self, api_key), fields(model = %self.settings.validation_model))]
    async fn validate_key(&self, api_key: &SecretString) -> KeyValidation {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": PROBE_PROMPT }] }],
            "generationConfig": { "maxOutputTokens": 5 }
        });
        match self
            .generate_content(api_key, &self.settings.validation_model, &body)
            .await
        {
            Ok(_) => KeyValidation::valid(),
            Err(cause) => KeyValidation::invalid(cause.to_string()),
        }
    }

    #[tracing::instrument(skip(self, api_key, request), fields(model = %self.settings.model))]
    async fn generate_activity(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity> {
        let prompt = build_prompt(request, OutputFormat::Json);
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.generation.temperature,
                "maxOutputTokens": self.generation.max_tokens,
                "responseMimeType": "application/json",
                "responseSchema": activity_schema()
            }
        });

        let failure = |cause| PortError::generation(Provider::Gemini, cause);
        let response = self
            .generate_content(api_key, &self.settings.model, &body)
            .await
            .map_err(failure)?;
        let content = response
            .into_text()
            .ok_or_else(|| failure(GenerationCause::EmptyResponse))?;
        debug!(chars = content.len(), "Received generateContent answer");

        parse_activity(&content, OutputFormat::Json, request.duration).map_err(failure)
    }
}
