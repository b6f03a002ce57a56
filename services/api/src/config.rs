//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Vendor API keys are deliberately absent:
//! every request brings its own.

use activity_planner_core::Provider;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection and model settings for one vendor.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub base_url: String,
    /// Model used to generate activities.
    pub model: String,
    /// Cheap model used for key validation probes.
    pub validation_model: String,
    /// Whether the vendor is asked for a JSON object. When false the adapter
    /// requests labeled plain text and parses the sections itself.
    pub json_mode: bool,
}

/// Sampling parameters shared by every provider.
#[derive(Clone, Copy, Debug)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_allowed_origin: String,
    pub database_url: Option<String>,
    pub openai: ProviderSettings,
    pub groq: ProviderSettings,
    pub gemini: ProviderSettings,
    pub deepseek: ProviderSettings,
    pub generation: GenerationSettings,
    pub request_timeout: Duration,
    pub disabled_providers: HashSet<Provider>,
    pub demo_mode: bool,
    pub max_pdf_bytes: usize,
    pub max_pdf_files: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_allowed_origin = or("CORS_ALLOWED_ORIGIN", "http://localhost:5173");
        let database_url = var("DATABASE_URL").filter(|url| !url.trim().is_empty());

        // --- Provider Settings ---
        let openai = ProviderSettings {
            base_url: or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: or("OPENAI_MODEL", "gpt-4o"),
            validation_model: or("OPENAI_VALIDATION_MODEL", "gpt-4o-mini"),
            json_mode: true,
        };
        let groq = ProviderSettings {
            base_url: or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            model: or("GROQ_MODEL", "llama-3.3-70b-versatile"),
            validation_model: or("GROQ_VALIDATION_MODEL", "llama-3.1-8b-instant"),
            json_mode: parse_bool(&var, "GROQ_JSON_MODE", true)?,
        };
        let gemini = ProviderSettings {
            base_url: or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            model: or("GEMINI_MODEL", "gemini-2.5-pro"),
            validation_model: or("GEMINI_VALIDATION_MODEL", "gemini-2.5-flash"),
            json_mode: true,
        };
        let deepseek = ProviderSettings {
            base_url: or("DEEPSEEK_BASE_URL", "https://api.deepseek.com"),
            model: or("DEEPSEEK_MODEL", "deepseek-chat"),
            validation_model: or("DEEPSEEK_VALIDATION_MODEL", "deepseek-chat"),
            json_mode: parse_bool(&var, "DEEPSEEK_JSON_MODE", true)?,
        };

        // --- Generation Settings ---
        let generation = GenerationSettings {
            temperature: parse_num(&var, "GENERATION_TEMPERATURE", 0.7_f32)?,
            max_tokens: parse_num(&var, "GENERATION_MAX_TOKENS", 4000_u32)?,
        };
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::InvalidValue(
                "GENERATION_TEMPERATURE".to_string(),
                "must be between 0.0 and 2.0".to_string(),
            ));
        }
        let request_timeout = Duration::from_secs(parse_num(&var, "REQUEST_TIMEOUT_SECS", 90_u64)?);

        let disabled_providers = var("DISABLED_PROVIDERS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<Provider>().map_err(|e| {
                    ConfigError::InvalidValue("DISABLED_PROVIDERS".to_string(), e.to_string())
                })
            })
            .collect::<Result<HashSet<_>, _>>()?;

        // --- Upload and Mode Settings ---
        let demo_mode = parse_bool(&var, "DEMO_MODE", false)?;
        let max_pdf_bytes = parse_num(&var, "MAX_PDF_BYTES", 50 * 1024 * 1024_usize)?;
        let max_pdf_files = parse_num(&var, "MAX_PDF_FILES", 10_usize)?;

        Ok(Self {
            bind_address,
            log_level,
            cors_allowed_origin,
            database_url,
            openai,
            groq,
            gemini,
            deepseek,
            generation,
            request_timeout,
            disabled_providers,
            demo_mode,
            max_pdf_bytes,
            max_pdf_files,
        })
    }

    pub fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Groq => &self.groq,
            Provider::Gemini => &self.gemini,
            Provider::DeepSeek => &self.deepseek,
        }
    }
}

fn parse_bool<F>(var: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", raw),
            )),
        },
    }
}

fn parse_num<F, T>(var: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
