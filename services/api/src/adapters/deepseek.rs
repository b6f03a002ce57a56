//! services/api/src/adapters/deepseek.rs
//!
//! DeepSeek adapter. The API mirrors OpenAI's chat completions but is called
//! over `reqwest` directly.

use activity_planner_core::{
    ActivityProvider, GeneratedActivity, GenerationCause, GenerationRequest, KeyValidation,
    PortError, PortResult, Provider,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::post_json;
use super::parsing::parse_activity;
use super::prompt::{build_prompt, OutputFormat, PROBE_PROMPT, SYSTEM_PROMPT};
use crate::config::{GenerationSettings, ProviderSettings};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct DeepSeekAdapter {
    http: reqwest::Client,
    settings: ProviderSettings,
    generation: GenerationSettings,
}

impl DeepSeekAdapter {
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

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn complete(
        &self,
        api_key: &SecretString,
        request: &ChatRequest<'_>,
    ) -> Result<String, GenerationCause> {
        let builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key.expose_secret());
        let response: ChatResponse = post_json(builder, request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationCause::EmptyResponse)
    }
}

#[async_trait]
impl ActivityProvider for DeepSeekAdapter {
    fn provider(&self) -> Provider {
        Provider::DeepSeek
    }

    #[tracing::instrument(skip(self, api_key), fields(model = %self.settings.validation_model))]
    async fn validate_key(&self, api_key: &SecretString) -> KeyValidation {
        let probe = ChatRequest {
            model: &self.settings.validation_model,
            messages: vec![ChatMessage {
                role: "user",
                content: PROBE_PROMPT,
            }],
            max_tokens: 5,
            temperature: None,
            response_format: None,
        };
        match self.complete(api_key, &probe).await {
            // An empty completion still proves the key was accepted.
            Ok(_) | Err(GenerationCause::EmptyResponse) => KeyValidation::valid(),
            Err(cause) => KeyValidation::invalid(cause.to_string()),
        }
    }

    #[tracing::instrument(skip(self, api_key, request), fields(model = %self.settings.model))]
    async fn generate_activity(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity> {
        let format = if self.settings.json_mode {
            OutputFormat::Json
        } else {
            OutputFormat::LabeledText
        };
        let prompt = build_prompt(request, format);
        let chat_request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.generation.max_tokens,
            temperature: Some(self.generation.temperature),
            response_format: (format == OutputFormat::Json).then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let content = self
            .complete(api_key, &chat_request)
            .await
            .map_err(|cause| PortError::generation(Provider::DeepSeek, cause))?;
        debug!(chars = content.len(), "Received completion");

        parse_activity(&content, format, request.duration)
            .map_err(|cause| PortError::generation(Provider::DeepSeek, cause))
    }
}
