//! crates/activity_planner_core/src/domain.rs
//!
//! Defines the core data structures for the application: what a clinician asks
//! for, what a provider hands back, and what gets stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

/// Longest time a single procedure phase may claim, in minutes.
pub const MAX_PHASE_MINUTES: u32 = 24 * 60;

/// Share of the session given to the opening, middle and closing phases when a
/// provider does not state phase times.
pub const PHASE_RATIOS: [f64; 3] = [0.15, 0.65, 0.20];

//=========================================================================================
// Providers
//=========================================================================================

/// The third-party LLM vendors an activity can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Groq,
    Gemini,
    DeepSeek,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Groq,
        Provider::Gemini,
        Provider::DeepSeek,
    ];

    /// The wire identifier used in forms, JSON bodies and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
            Provider::Gemini => "gemini",
            Provider::DeepSeek => "deepseek",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Groq => "Groq",
            Provider::Gemini => "Google Gemini",
            Provider::DeepSeek => "DeepSeek",
        }
    }

    /// Known key prefix and minimum length, used only when a live check is not
    /// possible.
    pub fn key_format(&self) -> (&'static str, usize) {
        match self {
            Provider::OpenAi => ("sk-", 20),
            Provider::Groq => ("gsk_", 50),
            Provider::Gemini => ("AIza", 30),
            Provider::DeepSeek => ("sk-", 20),
        }
    }

    /// Catalogue entry shown to clients choosing a provider.
    pub fn info(&self, enabled: bool) -> ProviderInfo {
        let (models, description): (&[&str], &str) = match self {
            Provider::OpenAi => (
                &["GPT-4o", "GPT-4o-mini"],
                "OpenAI models with strong reasoning capabilities",
            ),
            Provider::Groq => (
                &["Llama 3.3 70B", "Llama 3.1 8B"],
                "Open models served on low-latency hardware",
            ),
            Provider::Gemini => (
                &["Gemini 2.5 Pro", "Gemini 2.5 Flash"],
                "Google multimodal models with schema-constrained output",
            ),
            Provider::DeepSeek => (
                &["DeepSeek Chat"],
                "Efficient open-weight chat models",
            ),
        };
        ProviderInfo {
            id: *self,
            name: self.display_name().to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
            description: description.to_string(),
            enabled,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "groq" => Ok(Provider::Groq),
            "gemini" => Ok(Provider::Gemini),
            "deepseek" => Ok(Provider::DeepSeek),
            other => Err(PortError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: Provider,
    pub name: String,
    pub models: Vec<String>,
    pub description: String,
    pub enabled: bool,
}

/// Outcome of probing a provider with a candidate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False when the verdict comes from a format heuristic instead of a vendor
    /// round trip.
    pub authoritative: bool,
}

impl KeyValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
            authoritative: true,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            authoritative: true,
        }
    }

    /// Checks the key shape only. Never treat the result as proof of access.
    pub fn format_only(provider: Provider, api_key: &str) -> Self {
        let (prefix, min_len) = provider.key_format();
        let key = api_key.trim();
        Self {
            valid: key.starts_with(prefix) && key.len() >= min_len,
            error: Some("format-only check, not authoritative".to_string()),
            authoritative: false,
        }
    }
}

//=========================================================================================
// Generation Request
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Individual,
    #[serde(alias = "grupal")]
    Group,
    #[serde(alias = "familiar")]
    Family,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Individual => "individual",
            SessionType::Group => "group",
            SessionType::Family => "family",
        }
    }
}

impl FromStr for SessionType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Ok(SessionType::Individual),
            "group" | "grupal" => Ok(SessionType::Group),
            "family" | "familiar" => Ok(SessionType::Family),
            other => Err(PortError::InvalidInput(format!(
                "session type must be individual, group or family (got '{}')",
                other
            ))),
        }
    }
}

/// Everything a clinician submits to get one activity generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub patient_age: u32,
    pub patient_description: String,
    pub specific_objective: String,
    /// Session length in minutes.
    pub duration: u32,
    pub session_type: SessionType,
    pub is_pediatric: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_context: Option<String>,
    /// Text extracted from the uploaded reference PDFs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_contents: Option<Vec<String>>,
}

impl GenerationRequest {
    /// Rejects requests that must never reach a vendor.
    pub fn validate(&self) -> Result<(), PortError> {
        if self.patient_age == 0 {
            return Err(PortError::InvalidInput(
                "patient age must be a positive integer".to_string(),
            ));
        }
        if self.duration == 0 {
            return Err(PortError::InvalidInput(
                "duration must be a positive number of minutes".to_string(),
            ));
        }
        if self.patient_description.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "patient description is required".to_string(),
            ));
        }
        if self.specific_objective.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "specific objective is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Child-directed language is used for minors and for any session flagged
    /// as pediatric.
    pub fn is_child(&self) -> bool {
        self.patient_age < 18 || self.is_pediatric
    }
}

//=========================================================================================
// Generated Activity
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedurePhase {
    pub name: String,
    /// Minutes allotted to this phase.
    pub time: u32,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub criteria: String,
    pub methods: Vec<String>,
    pub feedback: String,
}

/// The normalized activity plan every provider adapter must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedActivity {
    pub title: String,
    pub smart_objective: String,
    #[serde(default)]
    pub description: String,
    pub materials: Vec<String>,
    pub procedure: Vec<ProcedurePhase>,
    #[serde(default)]
    pub evaluation: Evaluation,
    #[serde(default)]
    pub adaptations: Vec<String>,
    #[serde(default)]
    pub theoretical_foundation: String,
}

impl GeneratedActivity {
    /// Checks the shape an activity must have before it is handed to a caller.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("activity title is empty".to_string());
        }
        if self.smart_objective.trim().is_empty() {
            return Err("SMART objective is empty".to_string());
        }
        if self.procedure.is_empty() {
            return Err("procedure has no phases".to_string());
        }
        if let Some(index) = self.procedure.iter().position(|p| p.name.trim().is_empty()) {
            return Err(format!("procedure phase {} has no name", index + 1));
        }
        if let Some(index) = self
            .procedure
            .iter()
            .position(|p| p.time > MAX_PHASE_MINUTES)
        {
            return Err(format!("procedure phase {} lasts longer than a day", index + 1));
        }
        Ok(())
    }

    pub fn total_minutes(&self) -> u32 {
        self.procedure
            .iter()
            .fold(0, |total, p| total.saturating_add(p.time))
    }
}

/// Splits `duration` minutes across `phases` using the opening/middle/closing
/// ratios. Middle phases share the middle ratio evenly. The result always sums
/// to `duration`; rounding drift is absorbed by the longest phase.
pub fn split_duration(duration: u32, phases: usize) -> Vec<u32> {
    let weights: Vec<f64> = match phases {
        0 => return Vec::new(),
        1 => vec![1.0],
        2 => vec![PHASE_RATIOS[0] + PHASE_RATIOS[1] / 2.0, PHASE_RATIOS[2] + PHASE_RATIOS[1] / 2.0],
        n => {
            let middle = PHASE_RATIOS[1] / (n - 2) as f64;
            let mut w = Vec::with_capacity(n);
            w.push(PHASE_RATIOS[0]);
            w.extend(std::iter::repeat(middle).take(n - 2));
            w.push(PHASE_RATIOS[2]);
            w
        }
    };

    let mut times: Vec<u32> = weights
        .iter()
        .map(|w| (f64::from(duration) * w).round() as u32)
        .collect();

    let assigned = times.iter().fold(0u32, |total, t| total.saturating_add(*t));
    if assigned != duration {
        let longest = times
            .iter()
            .enumerate()
            .max_by_key(|(_, t)| **t)
            .map(|(i, _)| i)
            .unwrap_or(0);
        if assigned > duration {
            times[longest] = times[longest].saturating_sub(assigned - duration);
        } else {
            times[longest] += duration - assigned;
        }
    }
    times
}

//=========================================================================================
// Stored Activity
//=========================================================================================

/// A generated activity persisted together with the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredActivity {
    pub id: Uuid,
    pub provider: Provider,
    #[serde(flatten)]
    pub request: GenerationRequest,
    pub generated_activity: GeneratedActivity,
    pub created_at: DateTime<Utc>,
}
