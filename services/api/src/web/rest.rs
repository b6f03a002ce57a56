//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::export::{export_filename, render_activity_text};
use crate::web::form::{extract_pdf_texts, GenerateForm};
use crate::web::response::{ErrorBody, HttpError};
use crate::web::state::AppState;
use activity_planner_core::{
    GeneratedActivity, PortError, Provider, ProviderInfo, StoredActivity,
};
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_activity_handler,
        validate_key_handler,
        get_activity_handler,
        export_activity_handler,
        list_providers_handler,
    ),
    components(
        schemas(
            GenerateActivityResponse,
            ValidateKeyRequest,
            ValidateKeyResponse,
            ActivityResponse,
            ProvidersResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Speech Therapy Activity API", description = "Generates speech therapy activity plans with a choice of LLM providers.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after an activity has been generated and stored.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateActivityResponse {
    success: bool,
    #[schema(value_type = Object)]
    activity: GeneratedActivity,
    activity_id: Uuid,
    #[schema(value_type = String, example = "gemini")]
    provider: Provider,
    /// True when the activity came from the offline demo generator.
    demo: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeyRequest {
    #[serde(default, alias = "aiProvider")]
    provider: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeyResponse {
    success: bool,
    valid: bool,
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// False when only the key format could be checked.
    authoritative: bool,
    message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityResponse {
    success: bool,
    #[schema(value_type = Object)]
    activity: StoredActivity,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    success: bool,
    #[schema(value_type = Vec<Object>)]
    providers: Vec<ProviderInfo>,
    demo_mode: bool,
}

/// Ids that are not UUIDs cannot exist, so they read as not found.
fn parse_activity_id(raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw)
        .map_err(|_| HttpError::from(PortError::NotFound(format!("Activity {} not found", raw))))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a speech therapy activity.
///
/// Accepts a multipart/form-data request with the provider, the caller's API key,
/// the session parameters and up to the configured number of reference PDFs.
#[utoipa::path(
    post,
    path = "/api/generate-activity",
    request_body(content_type = "multipart/form-data", description = "Provider, API key, session fields and optional `pdfs` files."),
    responses(
        (status = 200, description = "Activity generated and stored", body = GenerateActivityResponse),
        (status = 400, description = "Invalid form, key or provider", body = ErrorBody),
        (status = 502, description = "The provider failed to produce a valid activity", body = ErrorBody),
        (status = 503, description = "The provider is temporarily unavailable", body = ErrorBody),
        (status = 504, description = "The provider did not answer in time", body = ErrorBody)
    )
)]
pub async fn generate_activity_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<GenerateActivityResponse>, HttpError> {
    let GenerateForm {
        provider: provider_id,
        api_key,
        mut request,
        pdfs,
    } = GenerateForm::from_multipart(&mut multipart, &app_state.config).await?;
    let provider = app_state
        .coordinator
        .check(&provider_id, &api_key, &request)?;

    if !pdfs.is_empty() {
        let texts = extract_pdf_texts(app_state.pdf_extractor.as_ref(), &pdfs).await;
        info!(uploaded = pdfs.len(), extracted = texts.len(), "Reference PDFs processed");
        request.pdf_contents = (!texts.is_empty()).then_some(texts);
    }

    let activity = app_state
        .coordinator
        .generate(&provider_id, &api_key, &request)
        .await?;

    // Extracted reference text is only needed for the prompt.
    request.pdf_contents = None;
    let stored = app_state
        .activities
        .create_activity(provider, &request, activity)
        .await?;

    Ok(Json(GenerateActivityResponse {
        success: true,
        activity: stored.generated_activity,
        activity_id: stored.id,
        provider,
        demo: app_state.coordinator.demo_mode(),
    }))
}

/// Check whether an API key is accepted by a provider.
#[utoipa::path(
    post,
    path = "/api/validate-key",
    request_body = ValidateKeyRequest,
    responses(
        (status = 200, description = "Verdict for the key", body = ValidateKeyResponse),
        (status = 400, description = "Missing fields or unsupported provider", body = ErrorBody)
    )
)]
pub async fn validate_key_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<ValidateKeyRequest>, JsonRejection>,
) -> Result<Json<ValidateKeyResponse>, HttpError> {
    let Json(payload) = payload.map_err(|e| HttpError::bad_request(e.body_text()))?;
    let (provider_id, api_key) = match (payload.provider, payload.api_key) {
        (Some(provider), Some(key)) if !provider.trim().is_empty() && !key.trim().is_empty() => {
            (provider, SecretString::from(key))
        }
        _ => return Err(HttpError::bad_request("A provider and an API key are required")),
    };

    let verdict = app_state.coordinator.validate(&provider_id, &api_key).await?;
    let provider: Provider = provider_id.parse()?;
    let label = provider.as_str().to_uppercase();
    let message = match (verdict.valid, verdict.authoritative) {
        (true, true) => format!("{} API key is valid", label),
        (true, false) => format!("{} API key looks well formed (format check only)", label),
        (false, _) => format!("{} API key is invalid", label),
    };

    Ok(Json(ValidateKeyResponse {
        success: true,
        valid: verdict.valid,
        provider: provider.as_str().to_string(),
        error: verdict.error,
        authoritative: verdict.authoritative,
        message,
    }))
}

/// Fetch a previously generated activity.
#[utoipa::path(
    get,
    path = "/api/activities/{id}",
    params(("id" = Uuid, Path, description = "Activity identifier")),
    responses(
        (status = 200, description = "The stored activity", body = ActivityResponse),
        (status = 404, description = "No activity with that id", body = ErrorBody)
    )
)]
pub async fn get_activity_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActivityResponse>, HttpError> {
    let id = parse_activity_id(&id)?;
    let activity = app_state.activities.get_activity(id).await?;
    Ok(Json(ActivityResponse {
        success: true,
        activity,
    }))
}

/// Download a stored activity as a plain-text document.
#[utoipa::path(
    get,
    path = "/api/activities/{id}/export",
    params(("id" = Uuid, Path, description = "Activity identifier")),
    responses(
        (status = 200, description = "Plain-text attachment", body = String, content_type = "text/plain"),
        (status = 404, description = "No activity with that id", body = ErrorBody)
    )
)]
pub async fn export_activity_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = parse_activity_id(&id)?;
    let stored = app_state.activities.get_activity(id).await?;
    let filename = export_filename(&stored.generated_activity.title);

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        render_activity_text(&stored),
    ))
}

/// List the supported providers and whether each can be used right now.
#[utoipa::path(
    get,
    path = "/api/providers",
    responses(
        (status = 200, description = "Provider catalogue", body = ProvidersResponse)
    )
)]
pub async fn list_providers_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        success: true,
        providers: app_state.coordinator.catalogue(),
        demo_mode: app_state.coordinator.demo_mode(),
    })
}
