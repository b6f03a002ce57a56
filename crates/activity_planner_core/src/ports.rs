//! crates/activity_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! Vendor clients, storage backends and document parsers live outside the core
//! and plug in through these traits.

use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    GeneratedActivity, GenerationRequest, KeyValidation, Provider, StoredActivity,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Why a generation call to a vendor did not produce an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationCause {
    /// The vendor could not be reached or answered with a non-success status.
    Transport { status: Option<u16>, body: String },
    Timeout(Duration),
    EmptyResponse,
    /// The response could not be decoded into an activity.
    Malformed(String),
    /// The response decoded but failed the activity shape checks.
    InvalidStructure(String),
}

impl GenerationCause {
    pub fn transport(status: Option<u16>, body: impl Into<String>) -> Self {
        GenerationCause::Transport {
            status,
            body: body.into(),
        }
    }
}

impl fmt::Display for GenerationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationCause::Transport {
                status: Some(status),
                body,
            } => write!(f, "vendor returned HTTP {}: {}", status, body),
            GenerationCause::Transport { status: None, body } => {
                write!(f, "vendor request failed: {}", body)
            }
            GenerationCause::Timeout(limit) => {
                write!(f, "vendor did not answer within {}s", limit.as_secs())
            }
            GenerationCause::EmptyResponse => f.write_str("vendor returned no content"),
            GenerationCause::Malformed(detail) => {
                write!(f, "vendor output could not be parsed: {}", detail)
            }
            GenerationCause::InvalidStructure(detail) => {
                write!(f, "vendor output has an invalid activity structure: {}", detail)
            }
        }
    }
}

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("An API key is required for {0}")]
    MissingCredential(Provider),
    #[error("Provider {0} is temporarily unavailable, please choose another provider")]
    ProviderUnavailable(Provider),
    #[error("Generation failed with {provider}: {cause}")]
    Generation {
        provider: Provider,
        cause: GenerationCause,
    },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn generation(provider: Provider, cause: GenerationCause) -> Self {
        PortError::Generation { provider, cause }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// One LLM vendor, able to check a key and turn a request into an activity.
///
/// The key is passed on every call and must only be used for that call.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Performs the cheapest authorized round trip. Failures of any kind are
    /// reported as an invalid verdict, never as an error.
    async fn validate_key(&self, api_key: &SecretString) -> KeyValidation;

    async fn generate_activity(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity>;
}

/// Keyed persistence for generated activities. Records are never updated or
/// deleted through this contract.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn create_activity(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        activity: GeneratedActivity,
    ) -> PortResult<StoredActivity>;

    async fn get_activity(&self, id: Uuid) -> PortResult<StoredActivity>;
}

#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    /// Extracts the readable text of one PDF document.
    async fn extract_text(&self, data: &[u8]) -> PortResult<String>;
}
