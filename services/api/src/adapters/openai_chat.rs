//! services/api/src/adapters/openai_chat.rs
//!
//! Adapter for vendors speaking the OpenAI chat-completions protocol: OpenAI
//! itself and Groq (via its OpenAI-compatible base URL). Requests are built with
//! the `async-openai` types and sent once over the shared `reqwest` client, so a
//! vendor error comes back with its status and body.
//! It implements the `ActivityProvider` port from the `core` crate.

use activity_planner_core::{
    ActivityProvider, GeneratedActivity, GenerationCause, GenerationRequest, KeyValidation,
    PortError, PortResult, Provider,
};
use async_openai::{
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat,
    },
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::http::post_json;
use super::parsing::parse_activity;
use super::prompt::{build_prompt, OutputFormat, PROBE_PROMPT, SYSTEM_PROMPT};
use crate::config::{GenerationSettings, ProviderSettings};

const PROBE_MAX_TOKENS: u32 = 5;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ActivityProvider` over an OpenAI-compatible chat API.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    provider: Provider,
    http: reqwest::Client,
    settings: ProviderSettings,
    generation: GenerationSettings,
}

impl OpenAiChatAdapter {
    /// Creates the adapter for OpenAI. OpenAI always runs in JSON mode.
    pub fn openai(
        http: reqwest::Client,
        settings: ProviderSettings,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            provider: Provider::OpenAi,
            http,
            settings: ProviderSettings {
                json_mode: true,
                ..settings
            },
            generation,
        }
    }

    /// Creates the adapter for Groq.
    pub fn groq(
        http: reqwest::Client,
        settings: ProviderSettings,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            provider: Provider::Groq,
            http,
            settings,
            generation,
        }
    }

    /// Sends one completion request authorised with this call's key only.
    async fn complete(
        &self,
        api_key: &SecretString,
        request: &CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, GenerationCause> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let builder = self.http.post(url).bearer_auth(api_key.expose_secret());
        post_json(builder, request).await
    }

    fn output_format(&self) -> OutputFormat {
        if self.settings.json_mode {
            OutputFormat::Json
        } else {
            OutputFormat::LabeledText
        }
    }

    fn messages(user: String) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()?
                .into(),
        ])
    }

    fn failure(&self, cause: GenerationCause) -> PortError {
        PortError::generation(self.provider, cause)
    }
}

//=========================================================================================
// `ActivityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl ActivityProvider for OpenAiChatAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    #[tracing::instrument(
        skip(self, api_key),
        fields(provider = %self.provider, model = %self.settings.validation_model)
    )]
    async fn validate_key(&self, api_key: &SecretString) -> KeyValidation {
        let request = Self::messages(PROBE_PROMPT.to_string()).and_then(|messages| {
            CreateChatCompletionRequestArgs::default()
                .model(&self.settings.validation_model)
                .messages(messages)
                .max_tokens(PROBE_MAX_TOKENS)
                .build()
        });
        let request = match request {
            Ok(request) => request,
            Err(e) => return KeyValidation::invalid(e.to_string()),
        };

        match self.complete(api_key, &request).await {
            Ok(_) => KeyValidation::valid(),
            Err(e) => KeyValidation::invalid(e.to_string()),
        }
    }

    #[tracing::instrument(
        skip(self, api_key, request),
        fields(provider = %self.provider, model = %self.settings.model)
    )]
    async fn generate_activity(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity> {
        let format = self.output_format();
        let messages = Self::messages(build_prompt(request, format))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.settings.model)
            .messages(messages)
            .max_tokens(self.generation.max_tokens)
            .temperature(self.generation.temperature);
        if format == OutputFormat::Json {
            args.response_format(ResponseFormat::JsonObject);
        }
        let chat_request = args
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .complete(api_key, &chat_request)
            .await
            .map_err(|cause| self.failure(cause))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| self.failure(GenerationCause::EmptyResponse))?;
        debug!(chars = content.len(), "Received completion");

        parse_activity(&content, format, request.duration).map_err(|cause| self.failure(cause))
    }
}
