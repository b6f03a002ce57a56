//! crates/activity_planner_core/src/coordinator.rs
//!
//! Routes validation and generation calls to the provider a caller asked for.
//! The API key travels with each call as a parameter; nothing here is shared
//! between requests except the read-only provider table.

use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::demo::demo_activity;
use crate::domain::{GeneratedActivity, GenerationRequest, KeyValidation, Provider, ProviderInfo};
use crate::ports::{ActivityProvider, GenerationCause, PortError, PortResult};

pub struct ProviderCoordinator {
    providers: HashMap<Provider, Arc<dyn ActivityProvider>>,
    disabled: HashSet<Provider>,
    timeout: Duration,
    demo_mode: bool,
}

impl ProviderCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            disabled: HashSet::new(),
            timeout,
            demo_mode: false,
        }
    }

    /// Registers an adapter under the provider it reports.
    pub fn with_provider(mut self, adapter: Arc<dyn ActivityProvider>) -> Self {
        self.providers.insert(adapter.provider(), adapter);
        self
    }

    /// Marks a provider as intentionally switched off.
    pub fn with_disabled(mut self, provider: Provider) -> Self {
        self.disabled.insert(provider);
        self
    }

    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider) && !self.disabled.contains(&provider)
    }

    /// Catalogue of every known provider and whether it can be used right now.
    pub fn catalogue(&self) -> Vec<ProviderInfo> {
        Provider::ALL
            .iter()
            .map(|p| p.info(self.is_enabled(*p)))
            .collect()
    }

    fn resolve(&self, provider_id: &str) -> PortResult<Provider> {
        let provider: Provider = provider_id.parse()?;
        if !self.providers.contains_key(&provider) && !self.disabled.contains(&provider) {
            return Err(PortError::UnsupportedProvider(provider_id.to_string()));
        }
        Ok(provider)
    }

    fn require_key(provider: Provider, api_key: &SecretString) -> PortResult<()> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(PortError::MissingCredential(provider));
        }
        Ok(())
    }

    /// Checks a key against the requested provider.
    ///
    /// Disabled providers get a format-only verdict flagged as non-authoritative.
    pub async fn validate(
        &self,
        provider_id: &str,
        api_key: &SecretString,
    ) -> PortResult<KeyValidation> {
        let provider = self.resolve(provider_id)?;
        Self::require_key(provider, api_key)?;

        let adapter = match self.providers.get(&provider) {
            Some(adapter) if !self.disabled.contains(&provider) => adapter,
            _ => {
                info!(%provider, "Live validation disabled, checking key format only");
                return Ok(KeyValidation::format_only(
                    provider,
                    api_key.expose_secret(),
                ));
            }
        };

        let verdict = match tokio::time::timeout(self.timeout, adapter.validate_key(api_key)).await
        {
            Ok(verdict) => verdict,
            Err(_) => KeyValidation::invalid(GenerationCause::Timeout(self.timeout).to_string()),
        };
        if !verdict.valid {
            warn!(%provider, error = ?verdict.error, "API key rejected");
        }
        Ok(verdict)
    }

    /// Runs every check of a generation call that needs no vendor round trip.
    pub fn check(
        &self,
        provider_id: &str,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<Provider> {
        let provider = self.resolve(provider_id)?;
        request.validate()?;
        Self::require_key(provider, api_key)?;
        if !self.demo_mode && !self.is_enabled(provider) {
            return Err(PortError::ProviderUnavailable(provider));
        }
        Ok(provider)
    }

    /// Generates an activity with exactly the requested provider.
    ///
    /// A failure is returned to the caller as-is; no other provider is tried.
    pub async fn generate(
        &self,
        provider_id: &str,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity> {
        let provider = self.check(provider_id, api_key, request)?;

        if self.demo_mode {
            info!(%provider, "Demo mode enabled, building offline activity");
            return Ok(demo_activity(request));
        }

        let adapter = self
            .providers
            .get(&provider)
            .ok_or(PortError::ProviderUnavailable(provider))?;

        info!(%provider, duration = request.duration, "Dispatching generation request");
        let result = tokio::time::timeout(self.timeout, adapter.generate_activity(api_key, request))
            .await
            .unwrap_or_else(|_| {
                Err(PortError::generation(
                    provider,
                    GenerationCause::Timeout(self.timeout),
                ))
            });

        match &result {
            Ok(activity) => info!(
                %provider,
                phases = activity.procedure.len(),
                minutes = activity.total_minutes(),
                "Activity generated"
            ),
            Err(e) => warn!(%provider, error = %e, "Activity generation failed"),
        }
        result
    }
}
